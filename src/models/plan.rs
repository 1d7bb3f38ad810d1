use chrono::{Duration, Months, Utc};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum PlanDuration {
    Daily,
    Weekly,
    Monthly,
}

impl PlanDuration {
    /// End of a validity window starting at `start`. Monthly windows follow
    /// the calendar and clamp to the last day of a shorter month.
    pub fn end_from(self, start: chrono::DateTime<Utc>) -> Option<chrono::DateTime<Utc>> {
        match self {
            PlanDuration::Daily => start.checked_add_signed(Duration::days(1)),
            PlanDuration::Weekly => start.checked_add_signed(Duration::days(7)),
            PlanDuration::Monthly => start.checked_add_months(Months::new(1)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum MealCategory {
    Veg,
    #[serde(rename = "Non-Veg")]
    NonVeg,
    Jain,
}

impl MealCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealCategory::Veg => "Veg",
            MealCategory::NonVeg => "Non-Veg",
            MealCategory::Jain => "Jain",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubscriptionPlan {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub mess_id: ObjectId,
    pub name: String,
    pub duration: PlanDuration,
    pub meal_type: MealCategory,
    pub price: f64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanDto {
    pub mess_id: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub duration: PlanDuration,
    pub meal_type: MealCategory,
    pub price: f64,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanDto {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub duration: Option<PlanDuration>,
    pub meal_type: Option<MealCategory>,
    pub price: Option<f64>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: String,
    pub mess_id: String,
    pub name: String,
    pub duration: PlanDuration,
    pub meal_type: MealCategory,
    pub price: f64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<SubscriptionPlan> for PlanResponse {
    fn from(plan: SubscriptionPlan) -> Self {
        PlanResponse {
            id: plan.id.map(|id| id.to_hex()).unwrap_or_default(),
            mess_id: plan.mess_id.to_hex(),
            name: plan.name,
            duration: plan.duration,
            meal_type: plan.meal_type,
            price: plan.price,
            description: plan.description,
            is_active: plan.is_active,
            created_at: plan.created_at.to_chrono(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_offsets() {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap();

        assert_eq!(
            PlanDuration::Daily.end_from(start),
            Some(Utc.with_ymd_and_hms(2024, 3, 11, 8, 30, 0).unwrap())
        );
        assert_eq!(
            PlanDuration::Weekly.end_from(start),
            Some(Utc.with_ymd_and_hms(2024, 3, 17, 8, 30, 0).unwrap())
        );
        assert_eq!(
            PlanDuration::Monthly.end_from(start),
            Some(Utc.with_ymd_and_hms(2024, 4, 10, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn monthly_clamps_to_end_of_shorter_month() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert_eq!(
            PlanDuration::Monthly.end_from(start),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn meal_category_wire_names() {
        assert_eq!(serde_json::to_string(&MealCategory::NonVeg).unwrap(), "\"Non-Veg\"");
        let parsed: MealCategory = serde_json::from_str("\"Jain\"").unwrap();
        assert_eq!(parsed, MealCategory::Jain);
    }
}
