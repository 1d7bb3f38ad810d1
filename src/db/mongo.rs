//! MongoDB store

use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use rocket::futures::TryStreamExt;

use super::error::DbResult;
use super::repo::{
    CheckInRepository, MealPassRepository, MessRepository, PlanRepository, SubscriptionRepository,
};
use crate::models::{
    CheckIn, CheckInFilter, CheckInStatus, MealPass, MealSlot, Mess, SubscriptionPlan,
    SubscriptionStatus, SubscriptionUpdate, UserSubscription,
};

const MESSES: &str = "messes";
const PLANS: &str = "subscription_plans";
const SUBSCRIPTIONS: &str = "user_subscriptions";
const MEAL_PASSES: &str = "meal_passes";
const CHECK_INS: &str = "check_ins";

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> DbResult<Self> {
        let client = Client::with_uri_str(uri).await?;

        // Test connection
        client
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await?;

        let store = MongoStore {
            db: client.database(database),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    /// Unique indexes backing the conditional writes.
    async fn ensure_indexes(&self) -> DbResult<()> {
        self.subscriptions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "plan_id": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        self.subscriptions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "end_date": 1 })
                    .build(),
                None,
            )
            .await?;

        self.meal_passes()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "token": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;

        self.check_ins()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "meal_pass_id": 1, "meal_type": 1, "day": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .partial_filter_expression(doc! {
                                "status": CheckInStatus::Success.as_str()
                            })
                            .build(),
                    )
                    .build(),
                None,
            )
            .await?;

        Ok(())
    }

    fn messes(&self) -> Collection<Mess> {
        self.db.collection(MESSES)
    }

    fn plans(&self) -> Collection<SubscriptionPlan> {
        self.db.collection(PLANS)
    }

    fn subscriptions(&self) -> Collection<UserSubscription> {
        self.db.collection(SUBSCRIPTIONS)
    }

    fn meal_passes(&self) -> Collection<MealPass> {
        self.db.collection(MEAL_PASSES)
    }

    fn check_ins(&self) -> Collection<CheckIn> {
        self.db.collection(CHECK_INS)
    }
}

fn newest_first() -> FindOptions {
    FindOptions::builder().sort(doc! { "created_at": -1 }).build()
}

#[async_trait]
impl MessRepository for MongoStore {
    async fn insert_mess(&self, mut mess: Mess) -> DbResult<Mess> {
        let result = self.messes().insert_one(&mess, None).await?;
        mess.id = result.inserted_id.as_object_id();
        Ok(mess)
    }

    async fn find_mess(&self, id: ObjectId) -> DbResult<Option<Mess>> {
        Ok(self.messes().find_one(doc! { "_id": id }, None).await?)
    }
}

#[async_trait]
impl PlanRepository for MongoStore {
    async fn insert_plan(&self, mut plan: SubscriptionPlan) -> DbResult<SubscriptionPlan> {
        let result = self.plans().insert_one(&plan, None).await?;
        plan.id = result.inserted_id.as_object_id();
        Ok(plan)
    }

    async fn find_plan(&self, id: ObjectId) -> DbResult<Option<SubscriptionPlan>> {
        Ok(self.plans().find_one(doc! { "_id": id }, None).await?)
    }

    async fn list_active_plans(&self, mess_id: Option<ObjectId>) -> DbResult<Vec<SubscriptionPlan>> {
        let mut filter = doc! { "is_active": true };
        if let Some(mess_id) = mess_id {
            filter.insert("mess_id", mess_id);
        }

        let plans: Vec<SubscriptionPlan> = self
            .plans()
            .find(filter, newest_first())
            .await?
            .try_collect()
            .await?;
        Ok(plans)
    }

    async fn replace_plan(&self, plan: &SubscriptionPlan) -> DbResult<bool> {
        let Some(id) = plan.id else {
            return Ok(false);
        };

        let result = self
            .plans()
            .replace_one(doc! { "_id": id }, plan, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_plan(&self, id: ObjectId) -> DbResult<bool> {
        let result = self.plans().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl SubscriptionRepository for MongoStore {
    async fn insert_subscription(&self, mut sub: UserSubscription) -> DbResult<UserSubscription> {
        let result = self.subscriptions().insert_one(&sub, None).await?;
        sub.id = result.inserted_id.as_object_id();
        Ok(sub)
    }

    async fn find_subscription(&self, id: ObjectId) -> DbResult<Option<UserSubscription>> {
        Ok(self.subscriptions().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_user_plan_subscription(
        &self,
        user_id: ObjectId,
        plan_id: ObjectId,
    ) -> DbResult<Option<UserSubscription>> {
        Ok(self
            .subscriptions()
            .find_one(doc! { "user_id": user_id, "plan_id": plan_id }, None)
            .await?)
    }

    async fn list_user_subscriptions(&self, user_id: ObjectId) -> DbResult<Vec<UserSubscription>> {
        let subs: Vec<UserSubscription> = self
            .subscriptions()
            .find(doc! { "user_id": user_id }, newest_first())
            .await?
            .try_collect()
            .await?;
        Ok(subs)
    }

    async fn list_mess_subscriptions(&self, mess_id: ObjectId) -> DbResult<Vec<UserSubscription>> {
        let subs: Vec<UserSubscription> = self
            .subscriptions()
            .find(doc! { "mess_id": mess_id }, newest_first())
            .await?
            .try_collect()
            .await?;
        Ok(subs)
    }

    async fn update_subscription(&self, id: ObjectId, update: SubscriptionUpdate) -> DbResult<bool> {
        let mut set = doc! { "updated_at": update.updated_at };
        if let Some(status) = update.status {
            set.insert("status", status.as_str());
        }
        if let Some(start) = update.start_date {
            set.insert("start_date", start);
        }
        if let Some(end) = update.end_date {
            set.insert("end_date", end);
        }

        let result = self
            .subscriptions()
            .update_one(doc! { "_id": id }, doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn cancel_if_active(&self, id: ObjectId, now: DateTime) -> DbResult<bool> {
        let result = self
            .subscriptions()
            .update_one(
                doc! { "_id": id, "status": SubscriptionStatus::Active.as_str() },
                doc! {
                    "$set": {
                        "status": SubscriptionStatus::Cancelled.as_str(),
                        "updated_at": now
                    }
                },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn mark_plan_removed(&self, plan_id: ObjectId, now: DateTime, reason: &str) -> DbResult<u64> {
        let result = self
            .subscriptions()
            .update_many(
                doc! { "plan_id": plan_id },
                doc! {
                    "$set": {
                        "status": SubscriptionStatus::PlanRemoved.as_str(),
                        "end_date": now,
                        "cancellation_reason": reason,
                        "updated_at": now
                    }
                },
                None,
            )
            .await?;
        Ok(result.matched_count)
    }

    async fn list_lapsed_subscriptions(&self, now: DateTime) -> DbResult<Vec<UserSubscription>> {
        let subs: Vec<UserSubscription> = self
            .subscriptions()
            .find(
                doc! {
                    "status": SubscriptionStatus::Active.as_str(),
                    "end_date": { "$lt": now }
                },
                None,
            )
            .await?
            .try_collect()
            .await?;
        Ok(subs)
    }

    async fn expire_if_lapsed(&self, id: ObjectId, now: DateTime) -> DbResult<bool> {
        let result = self
            .subscriptions()
            .update_one(
                doc! {
                    "_id": id,
                    "status": SubscriptionStatus::Active.as_str(),
                    "end_date": { "$lt": now }
                },
                doc! {
                    "$set": {
                        "status": SubscriptionStatus::Expired.as_str(),
                        "updated_at": now
                    }
                },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}

#[async_trait]
impl MealPassRepository for MongoStore {
    async fn insert_meal_pass(&self, mut pass: MealPass) -> DbResult<MealPass> {
        let result = self.meal_passes().insert_one(&pass, None).await?;
        pass.id = result.inserted_id.as_object_id();
        Ok(pass)
    }

    async fn find_meal_pass(&self, id: ObjectId) -> DbResult<Option<MealPass>> {
        Ok(self.meal_passes().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_meal_pass_by_token(&self, token: &str) -> DbResult<Option<MealPass>> {
        Ok(self.meal_passes().find_one(doc! { "token": token }, None).await?)
    }

    async fn list_current_meal_passes(&self, user_id: ObjectId, now: DateTime) -> DbResult<Vec<MealPass>> {
        let passes: Vec<MealPass> = self
            .meal_passes()
            .find(
                doc! {
                    "user_id": user_id,
                    "is_active": true,
                    "is_blocked": false,
                    "valid_till": { "$gte": now }
                },
                newest_first(),
            )
            .await?
            .try_collect()
            .await?;
        Ok(passes)
    }

    async fn deactivate_subscription_passes(&self, subscription_id: ObjectId, now: DateTime) -> DbResult<u64> {
        let result = self
            .meal_passes()
            .update_many(
                doc! { "subscription_id": subscription_id, "is_active": true },
                doc! { "$set": { "is_active": false, "updated_at": now } },
                None,
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn set_meal_pass_block(
        &self,
        id: ObjectId,
        blocked: bool,
        reason: Option<String>,
        now: DateTime,
    ) -> DbResult<bool> {
        let result = self
            .meal_passes()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "is_blocked": blocked,
                        "block_reason": reason,
                        "updated_at": now
                    }
                },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl CheckInRepository for MongoStore {
    async fn insert_check_in(&self, mut check_in: CheckIn) -> DbResult<CheckIn> {
        let result = self.check_ins().insert_one(&check_in, None).await?;
        check_in.id = result.inserted_id.as_object_id();
        Ok(check_in)
    }

    async fn list_check_ins(&self, filter: CheckInFilter) -> DbResult<Vec<CheckIn>> {
        let mut query = doc! { "mess_id": filter.mess_id };
        if let Some(user_id) = filter.user_id {
            query.insert("user_id", user_id);
        }
        if let Some(day) = filter.day {
            query.insert("day", day);
        }
        if let Some(meal) = filter.meal_type {
            query.insert("meal_type", meal.as_str());
        }

        let check_ins: Vec<CheckIn> = self
            .check_ins()
            .find(query, newest_first())
            .await?
            .try_collect()
            .await?;
        Ok(check_ins)
    }

    async fn count_check_ins_by_meal(&self, mess_id: ObjectId, day: &str) -> DbResult<Vec<(MealSlot, u64)>> {
        let pipeline = vec![
            doc! {
                "$match": {
                    "mess_id": mess_id,
                    "day": day,
                    "status": CheckInStatus::Success.as_str()
                }
            },
            doc! { "$group": { "_id": "$meal_type", "count": { "$sum": 1 } } },
        ];

        let groups: Vec<Document> = self
            .check_ins()
            .aggregate(pipeline, None)
            .await?
            .try_collect()
            .await?;

        let counts = groups
            .iter()
            .filter_map(|group| {
                let meal = MealSlot::parse(group.get_str("_id").ok()?)?;
                let count = group
                    .get_i32("count")
                    .map(i64::from)
                    .or_else(|_| group.get_i64("count"))
                    .ok()?;
                Some((meal, count.max(0) as u64))
            })
            .collect();
        Ok(counts)
    }
}
