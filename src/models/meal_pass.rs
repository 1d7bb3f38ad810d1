use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use super::{MessResponse, PlanResponse, SubscriptionResponse};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MealPass {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub subscription_id: ObjectId,
    pub mess_id: ObjectId,
    pub token: String,
    pub is_active: bool,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub valid_from: DateTime,
    pub valid_till: DateTime,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePassDto {
    pub qr_code: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlockPassDto {
    pub blocked: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MealPassResponse {
    pub id: String,
    pub user_id: String,
    pub subscription_id: String,
    pub mess_id: String,
    pub qr_code: String,
    pub is_active: bool,
    pub is_blocked: bool,
    pub block_reason: Option<String>,
    pub valid_from: chrono::DateTime<Utc>,
    pub valid_till: chrono::DateTime<Utc>,
}

impl From<MealPass> for MealPassResponse {
    fn from(pass: MealPass) -> Self {
        MealPassResponse {
            id: pass.id.map(|id| id.to_hex()).unwrap_or_default(),
            user_id: pass.user_id.to_hex(),
            subscription_id: pass.subscription_id.to_hex(),
            mess_id: pass.mess_id.to_hex(),
            qr_code: pass.token,
            is_active: pass.is_active,
            is_blocked: pass.is_blocked,
            block_reason: pass.block_reason,
            valid_from: pass.valid_from.to_chrono(),
            valid_till: pass.valid_till.to_chrono(),
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPassResponse {
    #[serde(flatten)]
    pub meal_pass: MealPassResponse,
    pub mess: Option<MessResponse>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub valid: bool,
    pub meal_pass: MealPassResponse,
    pub subscription: SubscriptionResponse,
    pub plan: Option<PlanResponse>,
}
