use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    /// Case-insensitive, so "Lunch" and "LUNCH" both count toward lunch.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "breakfast" => Some(MealSlot::Breakfast),
            "lunch" => Some(MealSlot::Lunch),
            "dinner" => Some(MealSlot::Dinner),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckInStatus {
    Success,
    Failed,
}

impl CheckInStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInStatus::Success => "success",
            CheckInStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CheckIn {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub mess_id: ObjectId,
    pub meal_pass_id: ObjectId,
    pub meal_type: MealSlot,
    pub status: CheckInStatus,
    pub failure_reason: Option<String>,
    /// Local calendar day (`YYYY-MM-DD`) of `created_at`.
    pub day: String,
    pub created_at: DateTime,
}

#[derive(Debug, Clone)]
pub struct CheckInFilter {
    pub mess_id: ObjectId,
    pub user_id: Option<ObjectId>,
    pub day: Option<String>,
    pub meal_type: Option<MealSlot>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckInDto {
    pub meal_pass_id: String,
    pub meal_type: String,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct CheckInQuery {
    #[field(name = "userId")]
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub date: Option<String>,
    #[field(name = "mealType")]
    #[serde(rename = "mealType")]
    pub meal_type: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub id: String,
    pub user_id: String,
    pub mess_id: String,
    pub meal_pass_id: String,
    pub meal_type: MealSlot,
    pub status: CheckInStatus,
    pub failure_reason: Option<String>,
    pub day: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<CheckIn> for CheckInResponse {
    fn from(check_in: CheckIn) -> Self {
        CheckInResponse {
            id: check_in.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: check_in.user_id.to_hex(),
            mess_id: check_in.mess_id.to_hex(),
            meal_pass_id: check_in.meal_pass_id.to_hex(),
            meal_type: check_in.meal_type,
            status: check_in.status,
            failure_reason: check_in.failure_reason,
            day: check_in.day,
            created_at: check_in.created_at.to_chrono(),
        }
    }
}

#[derive(Debug, Default, Serialize, PartialEq, Eq, JsonSchema)]
pub struct MealStats {
    pub breakfast: u64,
    pub lunch: u64,
    pub dinner: u64,
    pub total: u64,
}

impl MealStats {
    pub fn add(&mut self, slot: MealSlot, count: u64) {
        match slot {
            MealSlot::Breakfast => self.breakfast += count,
            MealSlot::Lunch => self.lunch += count,
            MealSlot::Dinner => self.dinner += count,
        }
        self.total += count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meal_slot_parse_is_case_insensitive() {
        assert_eq!(MealSlot::parse("Lunch"), Some(MealSlot::Lunch));
        assert_eq!(MealSlot::parse(" DINNER "), Some(MealSlot::Dinner));
        assert_eq!(MealSlot::parse("brunch"), None);
    }

    #[test]
    fn stats_buckets_default_to_zero() {
        let mut stats = MealStats::default();
        stats.add(MealSlot::Lunch, 3);
        assert_eq!(
            stats,
            MealStats { breakfast: 0, lunch: 3, dinner: 0, total: 3 }
        );
    }
}
