//! Repository traits
//!
//! Async interfaces over the document store. Every conditional write the
//! lifecycle depends on lives behind one of these methods so that both
//! backends apply it as a single operation.

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use super::error::DbResult;
use crate::models::{
    CheckIn, CheckInFilter, MealPass, MealSlot, Mess, SubscriptionPlan, SubscriptionUpdate,
    UserSubscription,
};

#[async_trait]
pub trait MessRepository: Send + Sync {
    async fn insert_mess(&self, mess: Mess) -> DbResult<Mess>;

    async fn find_mess(&self, id: ObjectId) -> DbResult<Option<Mess>>;
}

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn insert_plan(&self, plan: SubscriptionPlan) -> DbResult<SubscriptionPlan>;

    async fn find_plan(&self, id: ObjectId) -> DbResult<Option<SubscriptionPlan>>;

    /// Active plans, optionally restricted to one mess, newest first.
    async fn list_active_plans(&self, mess_id: Option<ObjectId>) -> DbResult<Vec<SubscriptionPlan>>;

    /// Overwrite a stored plan. Returns false if it no longer exists.
    async fn replace_plan(&self, plan: &SubscriptionPlan) -> DbResult<bool>;

    async fn delete_plan(&self, id: ObjectId) -> DbResult<bool>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Fails with `DbError::Duplicate` if the user already has a
    /// subscription to the same plan, whatever its status.
    async fn insert_subscription(&self, sub: UserSubscription) -> DbResult<UserSubscription>;

    async fn find_subscription(&self, id: ObjectId) -> DbResult<Option<UserSubscription>>;

    async fn find_user_plan_subscription(
        &self,
        user_id: ObjectId,
        plan_id: ObjectId,
    ) -> DbResult<Option<UserSubscription>>;

    async fn list_user_subscriptions(&self, user_id: ObjectId) -> DbResult<Vec<UserSubscription>>;

    async fn list_mess_subscriptions(&self, mess_id: ObjectId) -> DbResult<Vec<UserSubscription>>;

    /// Unconditional update. Returns false if the subscription is gone.
    async fn update_subscription(&self, id: ObjectId, update: SubscriptionUpdate) -> DbResult<bool>;

    /// Active → Cancelled, only if the stored status is still Active.
    async fn cancel_if_active(&self, id: ObjectId, now: DateTime) -> DbResult<bool>;

    /// Every subscription referencing the plan → Plan Removed. Returns the
    /// number of subscriptions transitioned.
    async fn mark_plan_removed(&self, plan_id: ObjectId, now: DateTime, reason: &str) -> DbResult<u64>;

    /// Active subscriptions whose end date is before `now`.
    async fn list_lapsed_subscriptions(&self, now: DateTime) -> DbResult<Vec<UserSubscription>>;

    /// Active → Expired, only if still Active and lapsed at `now`.
    async fn expire_if_lapsed(&self, id: ObjectId, now: DateTime) -> DbResult<bool>;
}

#[async_trait]
pub trait MealPassRepository: Send + Sync {
    /// Fails with `DbError::Duplicate` on a token collision.
    async fn insert_meal_pass(&self, pass: MealPass) -> DbResult<MealPass>;

    async fn find_meal_pass(&self, id: ObjectId) -> DbResult<Option<MealPass>>;

    async fn find_meal_pass_by_token(&self, token: &str) -> DbResult<Option<MealPass>>;

    /// Active, unblocked passes of the user still valid at `now`.
    async fn list_current_meal_passes(&self, user_id: ObjectId, now: DateTime) -> DbResult<Vec<MealPass>>;

    /// Deactivate every pass issued for the subscription. Returns the count.
    async fn deactivate_subscription_passes(&self, subscription_id: ObjectId, now: DateTime) -> DbResult<u64>;

    async fn set_meal_pass_block(
        &self,
        id: ObjectId,
        blocked: bool,
        reason: Option<String>,
        now: DateTime,
    ) -> DbResult<bool>;
}

#[async_trait]
pub trait CheckInRepository: Send + Sync {
    /// Fails with `DbError::Duplicate` if a successful check-in already
    /// exists for the same pass, meal and day.
    async fn insert_check_in(&self, check_in: CheckIn) -> DbResult<CheckIn>;

    /// Newest first.
    async fn list_check_ins(&self, filter: CheckInFilter) -> DbResult<Vec<CheckIn>>;

    /// Successful check-ins of one mess on one day, counted per meal.
    async fn count_check_ins_by_meal(&self, mess_id: ObjectId, day: &str) -> DbResult<Vec<(MealSlot, u64)>>;
}

/// Everything the server persists.
pub trait Store:
    MessRepository + PlanRepository + SubscriptionRepository + MealPassRepository + CheckInRepository
{
}

impl<T> Store for T where
    T: MessRepository
        + PlanRepository
        + SubscriptionRepository
        + MealPassRepository
        + CheckInRepository
{
}
