//! Meal-pass issuance and validation.
//!
//! A token is the hex SHA-256 digest of the issuance payload. It cannot be
//! reversed, so validation always resolves it against the store.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::db::{DbError, Store};
use crate::guards::AuthGuard;
use crate::models::{
    BlockPassDto, CurrentPassResponse, MealCategory, MealPass, SubscriptionPlan,
    SubscriptionStatus, UserSubscription, ValidationResponse,
};
use crate::services::MessService;
use crate::utils::{ApiError, Clock};

/// Inputs bound into a token.
pub struct TokenPayload<'a> {
    pub user_id: ObjectId,
    pub subscription_id: ObjectId,
    pub mess_id: ObjectId,
    pub plan_id: ObjectId,
    pub meal_type: MealCategory,
    pub issued_at: DateTime<Utc>,
    pub nonce: &'a str,
}

impl TokenPayload<'_> {
    pub fn digest(&self) -> String {
        // json! objects keep their keys sorted, so the encoding is canonical.
        let canonical = serde_json::json!({
            "userId": self.user_id.to_hex(),
            "subscriptionId": self.subscription_id.to_hex(),
            "messId": self.mess_id.to_hex(),
            "planId": self.plan_id.to_hex(),
            "mealType": self.meal_type.as_str(),
            "issuedAt": self.issued_at.timestamp_millis(),
            "nonce": self.nonce,
        });

        hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
    }
}

pub struct MealPassService;

impl MealPassService {
    /// Issue a pass valid for the subscription's current window.
    pub async fn issue(
        store: &dyn Store,
        clock: &dyn Clock,
        subscription: &UserSubscription,
        plan: &SubscriptionPlan,
    ) -> Result<MealPass, ApiError> {
        let subscription_id = subscription
            .id
            .ok_or_else(|| ApiError::internal_error("Subscription has no ID"))?;
        let plan_id = plan
            .id
            .ok_or_else(|| ApiError::internal_error("Plan has no ID"))?;

        let issued_at = clock.now();
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce = hex::encode(nonce);

        let token = TokenPayload {
            user_id: subscription.user_id,
            subscription_id,
            mess_id: plan.mess_id,
            plan_id,
            meal_type: plan.meal_type,
            issued_at,
            nonce: &nonce,
        }
        .digest();

        let now = clock.now_bson();
        let pass = MealPass {
            id: None,
            user_id: subscription.user_id,
            subscription_id,
            mess_id: plan.mess_id,
            token,
            is_active: true,
            is_blocked: false,
            block_reason: None,
            valid_from: subscription.start_date,
            valid_till: subscription.end_date,
            created_at: now,
            updated_at: now,
        };

        match store.insert_meal_pass(pass).await {
            Ok(pass) => Ok(pass),
            Err(DbError::Duplicate) => Err(ApiError::conflict("Meal pass token already exists")),
            Err(e) => Err(e.into()),
        }
    }

    /// Retire the subscription's passes and issue one for its new window.
    pub async fn reissue(
        store: &dyn Store,
        clock: &dyn Clock,
        subscription: &UserSubscription,
        plan: &SubscriptionPlan,
    ) -> Result<MealPass, ApiError> {
        if let Some(subscription_id) = subscription.id {
            let retired = store
                .deactivate_subscription_passes(subscription_id, clock.now_bson())
                .await?;
            log::debug!("Retired {} pass(es) of subscription {}", retired, subscription_id);
        }
        Self::issue(store, clock, subscription, plan).await
    }

    /// Walk the eligibility checks for a scanned token at `mess_id`,
    /// stopping at the first failure.
    pub async fn validate(
        store: &dyn Store,
        clock: &dyn Clock,
        token: &str,
        mess_id: ObjectId,
    ) -> Result<ValidationResponse, ApiError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::bad_request("QR code is required"));
        }

        let pass = store
            .find_meal_pass_by_token(token)
            .await?
            .ok_or_else(|| ApiError::not_found("Invalid QR code"))?;

        let subscription = store.find_subscription(pass.subscription_id).await?;
        let plan = match &subscription {
            Some(sub) => store.find_plan(sub.plan_id).await?,
            None => None,
        };

        if pass.mess_id != mess_id {
            return Err(ApiError::forbidden("This meal pass is not valid for this mess"));
        }

        if pass.is_blocked {
            let reason = pass.block_reason.as_deref().unwrap_or("no reason given");
            return Err(ApiError::forbidden(format!("Meal pass is blocked: {}", reason)));
        }

        let subscription = match subscription {
            Some(sub) if sub.status == SubscriptionStatus::Active => sub,
            Some(sub) => {
                return Err(ApiError::forbidden(format!(
                    "Subscription is not active (status: {})",
                    sub.status.as_str()
                )));
            }
            None => return Err(ApiError::forbidden("Subscription no longer exists")),
        };

        if !pass.is_active || clock.now_bson() > pass.valid_till {
            return Err(ApiError::forbidden("Meal pass has expired"));
        }

        Ok(ValidationResponse {
            valid: true,
            meal_pass: pass.into(),
            subscription: subscription.into(),
            plan: plan.map(Into::into),
        })
    }

    pub async fn set_blocked(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        pass_id: ObjectId,
        dto: BlockPassDto,
    ) -> Result<MealPass, ApiError> {
        let pass = store
            .find_meal_pass(pass_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Meal pass not found"))?;
        MessService::owned_by(store, pass.mess_id, caller).await?;

        let reason = if dto.blocked {
            dto.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty())
        } else {
            None
        };

        if !store
            .set_meal_pass_block(pass_id, dto.blocked, reason, clock.now_bson())
            .await?
        {
            return Err(ApiError::not_found("Meal pass not found"));
        }

        log::info!("Meal pass {} blocked={} by {}", pass_id, dto.blocked, caller.user_id);

        store
            .find_meal_pass(pass_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Meal pass not found"))
    }

    /// The user's usable passes, each with the mess it belongs to.
    pub async fn current_for_user(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        user_id: ObjectId,
    ) -> Result<Vec<CurrentPassResponse>, ApiError> {
        if caller.user_id != user_id {
            return Err(ApiError::forbidden("You can only view your own meal passes"));
        }

        let passes = store
            .list_current_meal_passes(user_id, clock.now_bson())
            .await?;

        let mut current = Vec::with_capacity(passes.len());
        for pass in passes {
            let mess = store.find_mess(pass.mess_id).await?;
            current.push(CurrentPassResponse {
                meal_pass: pass.into(),
                mess: mess.map(Into::into),
            });
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::MealPassRepository;
    use crate::services::jwt::Role;
    use crate::services::testing::Fixture;
    use chrono::{Duration, TimeZone};
    use rocket::http::Status;

    #[test]
    fn digest_is_hex_sha256_and_payload_sensitive() {
        let ids = (ObjectId::new(), ObjectId::new(), ObjectId::new(), ObjectId::new());
        let payload = |nonce| TokenPayload {
            user_id: ids.0,
            subscription_id: ids.1,
            mess_id: ids.2,
            plan_id: ids.3,
            meal_type: MealCategory::Veg,
            issued_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            nonce,
        };

        let a = payload("aa").digest();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, payload("aa").digest());
        assert_ne!(a, payload("bb").digest());
    }

    #[tokio::test]
    async fn issued_pass_copies_subscription_window() {
        let fx = Fixture::new().await;
        let (sub, pass) = fx.active_subscription().await;

        assert!(pass.is_active);
        assert!(!pass.is_blocked);
        assert_eq!(pass.valid_from, sub.start_date);
        assert_eq!(pass.valid_till, sub.end_date);
        assert_eq!(pass.mess_id, fx.mess_id);
    }

    #[tokio::test]
    async fn valid_pass_passes_all_checks() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;

        let result = MealPassService::validate(&*fx.store, &*fx.clock, &pass.token, fx.mess_id)
            .await
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.subscription.status, SubscriptionStatus::Active);
        assert!(result.plan.is_some());
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let fx = Fixture::new().await;
        let err = MealPassService::validate(&*fx.store, &*fx.clock, "deadbeef", fx.mess_id)
            .await
            .unwrap_err();
        assert_eq!(err.status, Status::NotFound);
    }

    #[tokio::test]
    async fn foreign_mess_is_forbidden_even_for_a_valid_pass() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;

        let err = MealPassService::validate(&*fx.store, &*fx.clock, &pass.token, ObjectId::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
    }

    #[tokio::test]
    async fn blocked_pass_is_forbidden() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;

        let blocked = MealPassService::set_blocked(
            &*fx.store,
            &*fx.clock,
            &fx.owner,
            pass.id.unwrap(),
            BlockPassDto { blocked: true, reason: Some("shared pass".into()) },
        )
        .await
        .unwrap();
        assert!(blocked.is_blocked);
        assert_eq!(blocked.block_reason.as_deref(), Some("shared pass"));

        let err = MealPassService::validate(&*fx.store, &*fx.clock, &pass.token, fx.mess_id)
            .await
            .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
        assert!(err.message.contains("shared pass"));
    }

    #[tokio::test]
    async fn only_the_mess_owner_can_block() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;
        let stranger = AuthGuard { user_id: ObjectId::new(), role: Role::MessOwner };

        let err = MealPassService::set_blocked(
            &*fx.store,
            &*fx.clock,
            &stranger,
            pass.id.unwrap(),
            BlockPassDto { blocked: true, reason: None },
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
    }

    #[tokio::test]
    async fn pending_subscription_is_forbidden() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.pending_subscription().await;

        let err = MealPassService::validate(&*fx.store, &*fx.clock, &pass.token, fx.mess_id)
            .await
            .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
        assert!(err.message.contains("Pending"));
    }

    #[tokio::test]
    async fn pass_past_valid_till_is_forbidden() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;

        // Weekly plan; the sweeper has not run yet so the subscription is still Active.
        fx.clock.advance(Duration::days(8));
        let err = MealPassService::validate(&*fx.store, &*fx.clock, &pass.token, fx.mess_id)
            .await
            .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
        assert_eq!(err.message, "Meal pass has expired");
    }

    #[tokio::test]
    async fn current_passes_include_mess_and_skip_blocked() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;

        let current = MealPassService::current_for_user(&*fx.store, &*fx.clock, &fx.user, fx.user.user_id)
            .await
            .unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].mess.as_ref().unwrap().name, "North Hall");

        fx.store
            .set_meal_pass_block(pass.id.unwrap(), true, None, fx.clock.now_bson())
            .await
            .unwrap();
        let current = MealPassService::current_for_user(&*fx.store, &*fx.clock, &fx.user, fx.user.user_id)
            .await
            .unwrap();
        assert!(current.is_empty());

        let err = MealPassService::current_for_user(&*fx.store, &*fx.clock, &fx.owner, fx.user.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.status, Status::Forbidden);
    }

    #[tokio::test]
    async fn token_collision_surfaces_as_failure() {
        let fx = Fixture::new().await;
        let (_, pass) = fx.active_subscription().await;

        let mut clone = pass.clone();
        clone.id = None;
        let err = fx.store.insert_meal_pass(clone).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate));
    }
}
