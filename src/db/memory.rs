//! In-process store used for local development and tests.
//!
//! Every operation takes one lock over all collections, so the conditional
//! writes are as atomic here as they are under MongoDB's unique indexes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};

use super::error::{DbError, DbResult};
use super::repo::{
    CheckInRepository, MealPassRepository, MessRepository, PlanRepository, SubscriptionRepository,
};
use crate::models::{
    CheckIn, CheckInFilter, CheckInStatus, MealPass, MealSlot, Mess, SubscriptionPlan,
    SubscriptionStatus, SubscriptionUpdate, UserSubscription,
};

#[derive(Default)]
struct Tables {
    messes: HashMap<ObjectId, Mess>,
    plans: HashMap<ObjectId, SubscriptionPlan>,
    subscriptions: HashMap<ObjectId, UserSubscription>,
    meal_passes: HashMap<ObjectId, MealPass>,
    check_ins: HashMap<ObjectId, CheckIn>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| DbError::Poisoned)
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl MessRepository for MemoryStore {
    async fn insert_mess(&self, mut mess: Mess) -> DbResult<Mess> {
        let id = ObjectId::new();
        mess.id = Some(id);
        self.lock()?.messes.insert(id, mess.clone());
        Ok(mess)
    }

    async fn find_mess(&self, id: ObjectId) -> DbResult<Option<Mess>> {
        Ok(self.lock()?.messes.get(&id).cloned())
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn insert_plan(&self, mut plan: SubscriptionPlan) -> DbResult<SubscriptionPlan> {
        let id = ObjectId::new();
        plan.id = Some(id);
        self.lock()?.plans.insert(id, plan.clone());
        Ok(plan)
    }

    async fn find_plan(&self, id: ObjectId) -> DbResult<Option<SubscriptionPlan>> {
        Ok(self.lock()?.plans.get(&id).cloned())
    }

    async fn list_active_plans(&self, mess_id: Option<ObjectId>) -> DbResult<Vec<SubscriptionPlan>> {
        let plans = self
            .lock()?
            .plans
            .values()
            .filter(|plan| plan.is_active && mess_id.is_none_or(|id| plan.mess_id == id))
            .cloned()
            .collect();
        Ok(newest_first(plans, |plan| plan.created_at))
    }

    async fn replace_plan(&self, plan: &SubscriptionPlan) -> DbResult<bool> {
        let Some(id) = plan.id else {
            return Ok(false);
        };

        let mut tables = self.lock()?;
        match tables.plans.get_mut(&id) {
            Some(stored) => {
                *stored = plan.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_plan(&self, id: ObjectId) -> DbResult<bool> {
        Ok(self.lock()?.plans.remove(&id).is_some())
    }
}

#[async_trait]
impl SubscriptionRepository for MemoryStore {
    async fn insert_subscription(&self, mut sub: UserSubscription) -> DbResult<UserSubscription> {
        let mut tables = self.lock()?;
        let taken = tables
            .subscriptions
            .values()
            .any(|existing| existing.user_id == sub.user_id && existing.plan_id == sub.plan_id);
        if taken {
            return Err(DbError::Duplicate);
        }

        let id = ObjectId::new();
        sub.id = Some(id);
        tables.subscriptions.insert(id, sub.clone());
        Ok(sub)
    }

    async fn find_subscription(&self, id: ObjectId) -> DbResult<Option<UserSubscription>> {
        Ok(self.lock()?.subscriptions.get(&id).cloned())
    }

    async fn find_user_plan_subscription(
        &self,
        user_id: ObjectId,
        plan_id: ObjectId,
    ) -> DbResult<Option<UserSubscription>> {
        Ok(self
            .lock()?
            .subscriptions
            .values()
            .find(|sub| sub.user_id == user_id && sub.plan_id == plan_id)
            .cloned())
    }

    async fn list_user_subscriptions(&self, user_id: ObjectId) -> DbResult<Vec<UserSubscription>> {
        let subs = self
            .lock()?
            .subscriptions
            .values()
            .filter(|sub| sub.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(subs, |sub| sub.created_at))
    }

    async fn list_mess_subscriptions(&self, mess_id: ObjectId) -> DbResult<Vec<UserSubscription>> {
        let subs = self
            .lock()?
            .subscriptions
            .values()
            .filter(|sub| sub.mess_id == mess_id)
            .cloned()
            .collect();
        Ok(newest_first(subs, |sub| sub.created_at))
    }

    async fn update_subscription(&self, id: ObjectId, update: SubscriptionUpdate) -> DbResult<bool> {
        let mut tables = self.lock()?;
        let Some(sub) = tables.subscriptions.get_mut(&id) else {
            return Ok(false);
        };

        if let Some(status) = update.status {
            sub.status = status;
        }
        if let Some(start) = update.start_date {
            sub.start_date = start;
        }
        if let Some(end) = update.end_date {
            sub.end_date = end;
        }
        sub.updated_at = update.updated_at;
        Ok(true)
    }

    async fn cancel_if_active(&self, id: ObjectId, now: DateTime) -> DbResult<bool> {
        let mut tables = self.lock()?;
        match tables.subscriptions.get_mut(&id) {
            Some(sub) if sub.status == SubscriptionStatus::Active => {
                sub.status = SubscriptionStatus::Cancelled;
                sub.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_plan_removed(&self, plan_id: ObjectId, now: DateTime, reason: &str) -> DbResult<u64> {
        let mut tables = self.lock()?;
        let mut removed = 0;
        for sub in tables.subscriptions.values_mut().filter(|sub| sub.plan_id == plan_id) {
            sub.status = SubscriptionStatus::PlanRemoved;
            sub.end_date = now;
            sub.cancellation_reason = Some(reason.to_string());
            sub.updated_at = now;
            removed += 1;
        }
        Ok(removed)
    }

    async fn list_lapsed_subscriptions(&self, now: DateTime) -> DbResult<Vec<UserSubscription>> {
        Ok(self
            .lock()?
            .subscriptions
            .values()
            .filter(|sub| sub.status == SubscriptionStatus::Active && sub.end_date < now)
            .cloned()
            .collect())
    }

    async fn expire_if_lapsed(&self, id: ObjectId, now: DateTime) -> DbResult<bool> {
        let mut tables = self.lock()?;
        match tables.subscriptions.get_mut(&id) {
            Some(sub) if sub.status == SubscriptionStatus::Active && sub.end_date < now => {
                sub.status = SubscriptionStatus::Expired;
                sub.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MealPassRepository for MemoryStore {
    async fn insert_meal_pass(&self, mut pass: MealPass) -> DbResult<MealPass> {
        let mut tables = self.lock()?;
        if tables.meal_passes.values().any(|existing| existing.token == pass.token) {
            return Err(DbError::Duplicate);
        }

        let id = ObjectId::new();
        pass.id = Some(id);
        tables.meal_passes.insert(id, pass.clone());
        Ok(pass)
    }

    async fn find_meal_pass(&self, id: ObjectId) -> DbResult<Option<MealPass>> {
        Ok(self.lock()?.meal_passes.get(&id).cloned())
    }

    async fn find_meal_pass_by_token(&self, token: &str) -> DbResult<Option<MealPass>> {
        Ok(self
            .lock()?
            .meal_passes
            .values()
            .find(|pass| pass.token == token)
            .cloned())
    }

    async fn list_current_meal_passes(&self, user_id: ObjectId, now: DateTime) -> DbResult<Vec<MealPass>> {
        let passes = self
            .lock()?
            .meal_passes
            .values()
            .filter(|pass| {
                pass.user_id == user_id && pass.is_active && !pass.is_blocked && pass.valid_till >= now
            })
            .cloned()
            .collect();
        Ok(newest_first(passes, |pass| pass.created_at))
    }

    async fn deactivate_subscription_passes(&self, subscription_id: ObjectId, now: DateTime) -> DbResult<u64> {
        let mut tables = self.lock()?;
        let mut deactivated = 0;
        for pass in tables
            .meal_passes
            .values_mut()
            .filter(|pass| pass.subscription_id == subscription_id && pass.is_active)
        {
            pass.is_active = false;
            pass.updated_at = now;
            deactivated += 1;
        }
        Ok(deactivated)
    }

    async fn set_meal_pass_block(
        &self,
        id: ObjectId,
        blocked: bool,
        reason: Option<String>,
        now: DateTime,
    ) -> DbResult<bool> {
        let mut tables = self.lock()?;
        let Some(pass) = tables.meal_passes.get_mut(&id) else {
            return Ok(false);
        };

        pass.is_blocked = blocked;
        pass.block_reason = reason;
        pass.updated_at = now;
        Ok(true)
    }
}

#[async_trait]
impl CheckInRepository for MemoryStore {
    async fn insert_check_in(&self, mut check_in: CheckIn) -> DbResult<CheckIn> {
        let mut tables = self.lock()?;
        if check_in.status == CheckInStatus::Success {
            let taken = tables.check_ins.values().any(|existing| {
                existing.status == CheckInStatus::Success
                    && existing.meal_pass_id == check_in.meal_pass_id
                    && existing.meal_type == check_in.meal_type
                    && existing.day == check_in.day
            });
            if taken {
                return Err(DbError::Duplicate);
            }
        }

        let id = ObjectId::new();
        check_in.id = Some(id);
        tables.check_ins.insert(id, check_in.clone());
        Ok(check_in)
    }

    async fn list_check_ins(&self, filter: CheckInFilter) -> DbResult<Vec<CheckIn>> {
        let check_ins = self
            .lock()?
            .check_ins
            .values()
            .filter(|c| c.mess_id == filter.mess_id)
            .filter(|c| filter.user_id.is_none_or(|id| c.user_id == id))
            .filter(|c| filter.day.as_deref().is_none_or(|day| c.day == day))
            .filter(|c| filter.meal_type.is_none_or(|meal| c.meal_type == meal))
            .cloned()
            .collect();
        Ok(newest_first(check_ins, |c| c.created_at))
    }

    async fn count_check_ins_by_meal(&self, mess_id: ObjectId, day: &str) -> DbResult<Vec<(MealSlot, u64)>> {
        let tables = self.lock()?;
        let mut counts: HashMap<MealSlot, u64> = HashMap::new();
        for c in tables.check_ins.values().filter(|c| {
            c.mess_id == mess_id && c.day == day && c.status == CheckInStatus::Success
        }) {
            *counts.entry(c.meal_type).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}
