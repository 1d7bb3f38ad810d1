//! Plans and the subscription state machine.
//!
//! ```text
//! Pending ──activate(Active)──▶ Active ──cancel──▶ Cancelled
//!                                 │
//!                                 └──sweep / set──▶ Expired
//! any ──deletePlan──▶ Plan Removed
//! ```
//! Cancelled and Expired can be brought back by the owner's explicit
//! `Active` override, which restarts the window from now.

use mongodb::bson::{self, oid::ObjectId};
use validator::Validate;

use crate::db::{DbError, Store};
use crate::guards::AuthGuard;
use crate::models::{
    ActivateSubscriptionDto, CreatePlanDto, PaymentStatus, PlanDuration, SubscriptionDetails,
    SubscriptionPlan, SubscriptionStatus, SubscriptionUpdate, UpdatePlanDto, UserSubscription,
    PLAN_REMOVED_REASON,
};
use crate::services::{MealPassService, MessService};
use crate::utils::{parse_object_id, validate_price, ApiError, Clock};

fn window_end(duration: PlanDuration, start: bson::DateTime) -> Result<bson::DateTime, ApiError> {
    duration
        .end_from(start.to_chrono())
        .map(bson::DateTime::from_chrono)
        .ok_or_else(|| ApiError::internal_error("Subscription end date out of range"))
}

pub struct SubscriptionService;

impl SubscriptionService {
    // ----------------------------------------------------------------------
    // Plans
    // ----------------------------------------------------------------------

    pub async fn create_plan(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        dto: CreatePlanDto,
    ) -> Result<SubscriptionPlan, ApiError> {
        caller.require_mess_owner()?;
        dto.validate()
            .map_err(|e| ApiError::bad_request(format!("Invalid plan: {}", e)))?;
        if !validate_price(dto.price) {
            return Err(ApiError::bad_request("Price must be a positive number"));
        }

        let mess_id = parse_object_id(&dto.mess_id, "mess ID")?;
        MessService::owned_by(store, mess_id, caller).await?;

        let now = clock.now_bson();
        let plan = SubscriptionPlan {
            id: None,
            mess_id,
            name: dto.name.trim().to_string(),
            duration: dto.duration,
            meal_type: dto.meal_type,
            price: dto.price,
            description: dto.description,
            is_active: dto.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        Ok(store.insert_plan(plan).await?)
    }

    pub async fn update_plan(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        plan_id: ObjectId,
        dto: UpdatePlanDto,
    ) -> Result<SubscriptionPlan, ApiError> {
        dto.validate()
            .map_err(|e| ApiError::bad_request(format!("Invalid plan: {}", e)))?;

        let mut plan = store
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription plan not found"))?;
        MessService::owned_by(store, plan.mess_id, caller).await?;

        if let Some(name) = dto.name {
            plan.name = name.trim().to_string();
        }
        if let Some(duration) = dto.duration {
            plan.duration = duration;
        }
        if let Some(meal_type) = dto.meal_type {
            plan.meal_type = meal_type;
        }
        if let Some(price) = dto.price {
            if !validate_price(price) {
                return Err(ApiError::bad_request("Price must be a positive number"));
            }
            plan.price = price;
        }
        if let Some(description) = dto.description {
            plan.description = Some(description);
        }
        if let Some(is_active) = dto.is_active {
            plan.is_active = is_active;
        }
        plan.updated_at = clock.now_bson();

        if !store.replace_plan(&plan).await? {
            return Err(ApiError::not_found("Subscription plan not found"));
        }
        Ok(plan)
    }

    pub async fn list_plans(
        store: &dyn Store,
        mess_id: Option<ObjectId>,
    ) -> Result<Vec<SubscriptionPlan>, ApiError> {
        Ok(store.list_active_plans(mess_id).await?)
    }

    /// Remove the plan and force every subscription to it into
    /// `Plan Removed`. Returns how many subscriptions were transitioned.
    pub async fn delete_plan(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        plan_id: ObjectId,
        caller_mess_id: ObjectId,
    ) -> Result<u64, ApiError> {
        let plan = store
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription plan not found"))?;

        if plan.mess_id != caller_mess_id {
            return Err(ApiError::forbidden("This plan does not belong to your mess"));
        }
        MessService::owned_by(store, caller_mess_id, caller).await?;

        let removed = store
            .mark_plan_removed(plan_id, clock.now_bson(), PLAN_REMOVED_REASON)
            .await?;
        store.delete_plan(plan_id).await?;

        log::info!(
            "Plan {} deleted; {} subscription(s) marked Plan Removed",
            plan_id,
            removed
        );
        Ok(removed)
    }

    // ----------------------------------------------------------------------
    // Subscriptions
    // ----------------------------------------------------------------------

    pub async fn subscribe(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        plan_id: ObjectId,
        requested_user: Option<ObjectId>,
    ) -> Result<UserSubscription, ApiError> {
        caller.require_user()?;
        if requested_user.is_some_and(|id| id != caller.user_id) {
            return Err(ApiError::forbidden("You can only subscribe for yourself"));
        }

        let plan = store
            .find_plan(plan_id)
            .await?
            .filter(|plan| plan.is_active)
            .ok_or_else(|| ApiError::not_found("Subscription plan not found or inactive"))?;

        if store
            .find_user_plan_subscription(caller.user_id, plan_id)
            .await?
            .is_some()
        {
            return Err(ApiError::conflict("You have already subscribed to this plan"));
        }

        let now = clock.now_bson();
        let subscription = UserSubscription {
            id: None,
            user_id: caller.user_id,
            plan_id,
            mess_id: plan.mess_id,
            start_date: now,
            end_date: window_end(plan.duration, now)?,
            status: SubscriptionStatus::Pending,
            payment_status: PaymentStatus::Pending,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        // The unique (user, plan) index settles concurrent subscribes.
        let subscription = match store.insert_subscription(subscription).await {
            Ok(sub) => sub,
            Err(DbError::Duplicate) => {
                return Err(ApiError::conflict("You have already subscribed to this plan"));
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = MealPassService::issue(store, clock, &subscription, &plan).await {
            log::warn!(
                "Meal pass issuance failed for subscription {:?}: {}",
                subscription.id,
                e.message
            );
        }

        Ok(subscription)
    }

    /// Subscriptions of `user_id` with their plan and mess resolved.
    pub async fn list_for_user(
        store: &dyn Store,
        caller: &AuthGuard,
        user_id: ObjectId,
    ) -> Result<Vec<SubscriptionDetails>, ApiError> {
        if caller.user_id != user_id {
            return Err(ApiError::forbidden("You can only view your own subscriptions"));
        }

        let subscriptions = store.list_user_subscriptions(user_id).await?;
        Self::populate(store, subscriptions).await
    }

    pub async fn list_for_mess(
        store: &dyn Store,
        caller: &AuthGuard,
        mess_id: ObjectId,
    ) -> Result<Vec<SubscriptionDetails>, ApiError> {
        MessService::owned_by(store, mess_id, caller).await?;

        let subscriptions = store.list_mess_subscriptions(mess_id).await?;
        Self::populate(store, subscriptions).await
    }

    async fn populate(
        store: &dyn Store,
        subscriptions: Vec<UserSubscription>,
    ) -> Result<Vec<SubscriptionDetails>, ApiError> {
        let mut details = Vec::with_capacity(subscriptions.len());
        for sub in subscriptions {
            let plan = store.find_plan(sub.plan_id).await?;
            let mess = store.find_mess(sub.mess_id).await?;
            details.push(SubscriptionDetails {
                subscription: sub.into(),
                plan: plan.map(Into::into),
                mess: mess.map(Into::into),
            });
        }
        Ok(details)
    }

    /// Owner only. With an explicit status the owner forces that status;
    /// without one the window restarts from now and the status is left alone.
    /// Whenever the window restarts the pass is re-issued to match it.
    pub async fn activate(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        subscription_id: ObjectId,
        dto: ActivateSubscriptionDto,
    ) -> Result<UserSubscription, ApiError> {
        let subscription = store
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;
        let plan = store
            .find_plan(subscription.plan_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription plan not found"))?;

        if let Some(raw) = dto.mess_id.as_deref() {
            let caller_mess_id = parse_object_id(raw, "mess ID")?;
            if caller_mess_id != plan.mess_id {
                return Err(ApiError::forbidden("This subscription does not belong to your mess"));
            }
        }

        MessService::owned_by(store, plan.mess_id, caller).await?;

        let now = clock.now_bson();
        let update = match dto.status {
            Some(SubscriptionStatus::Active) => SubscriptionUpdate {
                status: Some(SubscriptionStatus::Active),
                start_date: Some(now),
                end_date: Some(window_end(plan.duration, now)?),
                updated_at: now,
            },
            Some(status @ (SubscriptionStatus::Cancelled | SubscriptionStatus::Expired)) => {
                SubscriptionUpdate {
                    status: Some(status),
                    start_date: None,
                    end_date: Some(now),
                    updated_at: now,
                }
            }
            Some(SubscriptionStatus::Pending) => SubscriptionUpdate {
                status: Some(SubscriptionStatus::Pending),
                start_date: None,
                end_date: None,
                updated_at: now,
            },
            Some(SubscriptionStatus::PlanRemoved) => {
                return Err(ApiError::bad_request(
                    "Plan Removed is set only when the plan is deleted",
                ));
            }
            None => SubscriptionUpdate {
                status: None,
                start_date: Some(now),
                end_date: Some(window_end(plan.duration, now)?),
                updated_at: now,
            },
        };

        if !store.update_subscription(subscription_id, update).await? {
            return Err(ApiError::not_found("Subscription not found"));
        }

        let updated = store
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

        if matches!(dto.status, Some(SubscriptionStatus::Active) | None) {
            if let Err(e) = MealPassService::reissue(store, clock, &updated, &plan).await {
                log::warn!(
                    "Meal pass re-issuance failed for subscription {}: {}",
                    subscription_id,
                    e.message
                );
            }
        }

        log::info!(
            "Subscription {} activated by {} (status: {})",
            subscription_id,
            caller.user_id,
            updated.status.as_str()
        );
        Ok(updated)
    }

    pub async fn cancel(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        subscription_id: ObjectId,
    ) -> Result<UserSubscription, ApiError> {
        let subscription = store
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))?;

        if subscription.user_id != caller.user_id {
            return Err(ApiError::forbidden("Not authorized to cancel this subscription"));
        }
        if subscription.status != SubscriptionStatus::Active {
            return Err(ApiError::invalid_state(format!(
                "Only active subscriptions can be cancelled (status: {})",
                subscription.status.as_str()
            )));
        }

        // Conditional on the stored status so a concurrent sweep is not overwritten.
        if !store.cancel_if_active(subscription_id, clock.now_bson()).await? {
            return Err(ApiError::invalid_state("Subscription is no longer active"));
        }

        store
            .find_subscription(subscription_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Subscription not found"))
    }
}
