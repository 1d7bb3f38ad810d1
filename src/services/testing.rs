//! Shared setup for service tests: one mess, its owner, one weekly plan and
//! a plain user, on an in-memory store with a hand-driven clock.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::db::error::DbResult;
use crate::db::repo::{
    CheckInRepository, MealPassRepository, MessRepository, PlanRepository, SubscriptionRepository,
};
use crate::db::{DbError, MemoryStore};
use crate::guards::AuthGuard;
use crate::models::{
    ActivateSubscriptionDto, CheckIn, CheckInFilter, CreateMessDto, CreatePlanDto, MealCategory,
    MealPass, MealSlot, Mess, PlanDuration, SubscriptionPlan, SubscriptionStatus,
    SubscriptionUpdate, UserSubscription,
};
use crate::services::jwt::Role;
use crate::services::{MessService, SubscriptionService};
use crate::utils::clock::testing::ManualClock;
use crate::utils::Clock;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub owner: AuthGuard,
    pub user: AuthGuard,
    pub mess_id: ObjectId,
    pub plan_id: ObjectId,
}

impl Fixture {
    pub async fn new() -> Self {
        // 09:00 UTC is 14:30 in IST, well clear of either midnight.
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();

        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::with_offset(start, ist));
        let owner = AuthGuard { user_id: ObjectId::new(), role: Role::MessOwner };
        let user = AuthGuard { user_id: ObjectId::new(), role: Role::User };

        let mess = MessService::create(
            &*store,
            &*clock,
            &owner,
            CreateMessDto { name: "North Hall".into(), address: None },
        )
        .await
        .unwrap();
        let mess_id = mess.id.unwrap();

        let mut fixture = Fixture {
            store,
            clock,
            owner,
            user,
            mess_id,
            plan_id: ObjectId::new(),
        };
        fixture.plan_id = fixture.plan_with(PlanDuration::Weekly).await;
        fixture
    }

    pub async fn plan_with(&self, duration: PlanDuration) -> ObjectId {
        let plan = SubscriptionService::create_plan(
            &*self.store,
            &*self.clock,
            &self.owner,
            CreatePlanDto {
                mess_id: self.mess_id.to_hex(),
                name: format!("{:?} thali", duration),
                duration,
                meal_type: MealCategory::Veg,
                price: 100.0,
                description: None,
                is_active: None,
            },
        )
        .await
        .unwrap();
        plan.id.unwrap()
    }

    async fn current_pass(&self, subscription_id: ObjectId) -> MealPass {
        self.store
            .list_current_meal_passes(self.user.user_id, self.clock.now_bson())
            .await
            .unwrap()
            .into_iter()
            .find(|pass| pass.subscription_id == subscription_id)
            .unwrap()
    }

    /// The fixture user's fresh subscription to the fixture plan.
    pub async fn pending_subscription(&self) -> (UserSubscription, MealPass) {
        let sub = SubscriptionService::subscribe(&*self.store, &*self.clock, &self.user, self.plan_id, None)
            .await
            .unwrap();
        let pass = self.current_pass(sub.id.unwrap()).await;
        (sub, pass)
    }

    /// As `pending_subscription`, then activated by the owner.
    pub async fn active_subscription(&self) -> (UserSubscription, MealPass) {
        let (sub, _) = self.pending_subscription().await;
        let sub = SubscriptionService::activate(
            &*self.store,
            &*self.clock,
            &self.owner,
            sub.id.unwrap(),
            ActivateSubscriptionDto {
                status: Some(SubscriptionStatus::Active),
                mess_id: Some(self.mess_id.to_hex()),
            },
        )
        .await
        .unwrap();
        let pass = self.current_pass(sub.id.unwrap()).await;
        (sub, pass)
    }

    /// Write a status straight to the store, bypassing the transition rules.
    pub async fn force_status(&self, id: ObjectId, status: SubscriptionStatus) {
        let updated = self
            .store
            .update_subscription(
                id,
                SubscriptionUpdate {
                    status: Some(status),
                    start_date: None,
                    end_date: None,
                    updated_at: self.clock.now_bson(),
                },
            )
            .await
            .unwrap();
        assert!(updated);
    }
}

/// Memory store that fails chosen writes, for exercising error paths.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    failing_expiries: Mutex<HashSet<ObjectId>>,
    failing_pass_inserts: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        FaultyStore {
            inner,
            failing_expiries: Mutex::new(HashSet::new()),
            failing_pass_inserts: AtomicBool::new(false),
        }
    }

    pub fn fail_expiry_of(&self, id: ObjectId) {
        self.failing_expiries.lock().unwrap().insert(id);
    }

    pub fn fail_pass_inserts(&self) {
        self.failing_pass_inserts.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessRepository for FaultyStore {
    async fn insert_mess(&self, mess: Mess) -> DbResult<Mess> {
        self.inner.insert_mess(mess).await
    }

    async fn find_mess(&self, id: ObjectId) -> DbResult<Option<Mess>> {
        self.inner.find_mess(id).await
    }
}

#[async_trait]
impl PlanRepository for FaultyStore {
    async fn insert_plan(&self, plan: SubscriptionPlan) -> DbResult<SubscriptionPlan> {
        self.inner.insert_plan(plan).await
    }

    async fn find_plan(&self, id: ObjectId) -> DbResult<Option<SubscriptionPlan>> {
        self.inner.find_plan(id).await
    }

    async fn list_active_plans(&self, mess_id: Option<ObjectId>) -> DbResult<Vec<SubscriptionPlan>> {
        self.inner.list_active_plans(mess_id).await
    }

    async fn replace_plan(&self, plan: &SubscriptionPlan) -> DbResult<bool> {
        self.inner.replace_plan(plan).await
    }

    async fn delete_plan(&self, id: ObjectId) -> DbResult<bool> {
        self.inner.delete_plan(id).await
    }
}

#[async_trait]
impl SubscriptionRepository for FaultyStore {
    async fn insert_subscription(&self, sub: UserSubscription) -> DbResult<UserSubscription> {
        self.inner.insert_subscription(sub).await
    }

    async fn find_subscription(&self, id: ObjectId) -> DbResult<Option<UserSubscription>> {
        self.inner.find_subscription(id).await
    }

    async fn find_user_plan_subscription(
        &self,
        user_id: ObjectId,
        plan_id: ObjectId,
    ) -> DbResult<Option<UserSubscription>> {
        self.inner.find_user_plan_subscription(user_id, plan_id).await
    }

    async fn list_user_subscriptions(&self, user_id: ObjectId) -> DbResult<Vec<UserSubscription>> {
        self.inner.list_user_subscriptions(user_id).await
    }

    async fn list_mess_subscriptions(&self, mess_id: ObjectId) -> DbResult<Vec<UserSubscription>> {
        self.inner.list_mess_subscriptions(mess_id).await
    }

    async fn update_subscription(&self, id: ObjectId, update: SubscriptionUpdate) -> DbResult<bool> {
        self.inner.update_subscription(id, update).await
    }

    async fn cancel_if_active(&self, id: ObjectId, now: DateTime) -> DbResult<bool> {
        self.inner.cancel_if_active(id, now).await
    }

    async fn mark_plan_removed(&self, plan_id: ObjectId, now: DateTime, reason: &str) -> DbResult<u64> {
        self.inner.mark_plan_removed(plan_id, now, reason).await
    }

    async fn list_lapsed_subscriptions(&self, now: DateTime) -> DbResult<Vec<UserSubscription>> {
        self.inner.list_lapsed_subscriptions(now).await
    }

    async fn expire_if_lapsed(&self, id: ObjectId, now: DateTime) -> DbResult<bool> {
        if self.failing_expiries.lock().unwrap().contains(&id) {
            return Err(DbError::Poisoned);
        }
        self.inner.expire_if_lapsed(id, now).await
    }
}

#[async_trait]
impl MealPassRepository for FaultyStore {
    async fn insert_meal_pass(&self, pass: MealPass) -> DbResult<MealPass> {
        if self.failing_pass_inserts.load(Ordering::SeqCst) {
            return Err(DbError::Poisoned);
        }
        self.inner.insert_meal_pass(pass).await
    }

    async fn find_meal_pass(&self, id: ObjectId) -> DbResult<Option<MealPass>> {
        self.inner.find_meal_pass(id).await
    }

    async fn find_meal_pass_by_token(&self, token: &str) -> DbResult<Option<MealPass>> {
        self.inner.find_meal_pass_by_token(token).await
    }

    async fn list_current_meal_passes(&self, user_id: ObjectId, now: DateTime) -> DbResult<Vec<MealPass>> {
        self.inner.list_current_meal_passes(user_id, now).await
    }

    async fn deactivate_subscription_passes(&self, subscription_id: ObjectId, now: DateTime) -> DbResult<u64> {
        self.inner.deactivate_subscription_passes(subscription_id, now).await
    }

    async fn set_meal_pass_block(
        &self,
        id: ObjectId,
        blocked: bool,
        reason: Option<String>,
        now: DateTime,
    ) -> DbResult<bool> {
        self.inner.set_meal_pass_block(id, blocked, reason, now).await
    }
}

#[async_trait]
impl CheckInRepository for FaultyStore {
    async fn insert_check_in(&self, check_in: CheckIn) -> DbResult<CheckIn> {
        self.inner.insert_check_in(check_in).await
    }

    async fn list_check_ins(&self, filter: CheckInFilter) -> DbResult<Vec<CheckIn>> {
        self.inner.list_check_ins(filter).await
    }

    async fn count_check_ins_by_meal(&self, mess_id: ObjectId, day: &str) -> DbResult<Vec<(MealSlot, u64)>> {
        self.inner.count_check_ins_by_meal(mess_id, day).await
    }
}
