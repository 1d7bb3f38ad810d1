use mongodb::bson::oid::ObjectId;

use crate::db::{DbError, Store};
use crate::guards::AuthGuard;
use crate::models::{
    CheckIn, CheckInFilter, CheckInQuery, CheckInStatus, MealSlot, MealStats, SubscriptionStatus,
};
use crate::services::MessService;
use crate::utils::{parse_object_id, validate_day, ApiError, Clock};

pub struct CheckInService;

impl CheckInService {
    /// Record a meal under a pass. At most one successful check-in exists per
    /// pass, meal and local day; the store enforces it on insert.
    pub async fn record(
        store: &dyn Store,
        clock: &dyn Clock,
        meal_pass_id: ObjectId,
        meal_type: &str,
        mess_id: ObjectId,
    ) -> Result<CheckIn, ApiError> {
        let pass = store
            .find_meal_pass(meal_pass_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Meal pass not found"))?;

        let meal = MealSlot::parse(meal_type)
            .ok_or_else(|| ApiError::bad_request("Meal type must be breakfast, lunch or dinner"))?;

        if pass.mess_id != mess_id {
            return Err(ApiError::forbidden("This meal pass is not valid for this mess"));
        }
        if !pass.is_active || pass.is_blocked {
            return Err(ApiError::forbidden("Meal pass is inactive or blocked"));
        }

        let subscription_active = store
            .find_subscription(pass.subscription_id)
            .await?
            .is_some_and(|sub| sub.status == SubscriptionStatus::Active);
        if !subscription_active {
            return Err(ApiError::forbidden("Subscription is not active"));
        }

        let check_in = CheckIn {
            id: None,
            user_id: pass.user_id,
            mess_id: pass.mess_id,
            meal_pass_id,
            meal_type: meal,
            status: CheckInStatus::Success,
            failure_reason: None,
            day: clock.today(),
            created_at: clock.now_bson(),
        };

        match store.insert_check_in(check_in).await {
            Ok(check_in) => Ok(check_in),
            Err(DbError::Duplicate) => Err(ApiError::conflict(format!(
                "Already checked in for {} today",
                meal.as_str()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list(
        store: &dyn Store,
        caller: &AuthGuard,
        mess_id: ObjectId,
        query: CheckInQuery,
    ) -> Result<Vec<CheckIn>, ApiError> {
        MessService::owned_by(store, mess_id, caller).await?;

        let user_id = query
            .user_id
            .as_deref()
            .map(|raw| parse_object_id(raw, "user ID"))
            .transpose()?;

        let day = match query.date {
            Some(date) if !validate_day(&date) => {
                return Err(ApiError::bad_request("Date must be formatted as YYYY-MM-DD"));
            }
            other => other,
        };

        let meal_type = query
            .meal_type
            .as_deref()
            .map(|raw| {
                MealSlot::parse(raw)
                    .ok_or_else(|| ApiError::bad_request("Meal type must be breakfast, lunch or dinner"))
            })
            .transpose()?;

        Ok(store
            .list_check_ins(CheckInFilter {
                mess_id,
                user_id,
                day,
                meal_type,
            })
            .await?)
    }

    /// Today's successful check-ins at the mess, one bucket per meal.
    pub async fn today_stats(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        mess_id: ObjectId,
    ) -> Result<MealStats, ApiError> {
        MessService::owned_by(store, mess_id, caller).await?;

        let mut stats = MealStats::default();
        for (meal, count) in store.count_check_ins_by_meal(mess_id, &clock.today()).await? {
            stats.add(meal, count);
        }
        Ok(stats)
    }
}
