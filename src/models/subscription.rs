use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use super::{MessResponse, PlanResponse};

pub const PLAN_REMOVED_REASON: &str = "Subscription plan was removed by the mess owner";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
    #[serde(rename = "Plan Removed")]
    PlanRemoved,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "Pending",
            SubscriptionStatus::Active => "Active",
            SubscriptionStatus::Expired => "Expired",
            SubscriptionStatus::Cancelled => "Cancelled",
            SubscriptionStatus::PlanRemoved => "Plan Removed",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserSubscription {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    // Not a guarantee: the plan may have been deleted since.
    pub plan_id: ObjectId,
    pub mess_id: ObjectId,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Field changes applied by a single status transition.
#[derive(Debug, Clone)]
pub struct SubscriptionUpdate {
    pub status: Option<SubscriptionStatus>,
    pub start_date: Option<DateTime>,
    pub end_date: Option<DateTime>,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeDto {
    pub plan_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSubscriptionDto {
    pub status: Option<SubscriptionStatus>,
    pub mess_id: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub mess_id: String,
    pub start_date: chrono::DateTime<Utc>,
    pub end_date: chrono::DateTime<Utc>,
    pub status: SubscriptionStatus,
    pub payment_status: PaymentStatus,
    pub cancellation_reason: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<UserSubscription> for SubscriptionResponse {
    fn from(sub: UserSubscription) -> Self {
        SubscriptionResponse {
            id: sub.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: sub.user_id.to_hex(),
            plan_id: sub.plan_id.to_hex(),
            mess_id: sub.mess_id.to_hex(),
            start_date: sub.start_date.to_chrono(),
            end_date: sub.end_date.to_chrono(),
            status: sub.status,
            payment_status: sub.payment_status,
            cancellation_reason: sub.cancellation_reason,
            created_at: sub.created_at.to_chrono(),
        }
    }
}

/// A subscription with its plan and mess looked up at read time.
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    #[serde(flatten)]
    pub subscription: SubscriptionResponse,
    pub plan: Option<PlanResponse>,
    pub mess: Option<MessResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::PlanRemoved).unwrap(),
            "\"Plan Removed\""
        );
        let parsed: SubscriptionStatus = serde_json::from_str("\"Cancelled\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Cancelled);
        assert_eq!(SubscriptionStatus::PlanRemoved.as_str(), "Plan Removed");
    }
}
