use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Mess {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub owner_id: ObjectId,
    pub address: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema, Validate)]
pub struct CreateMessDto {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 300))]
    pub address: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessResponse {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub address: Option<String>,
}

impl From<Mess> for MessResponse {
    fn from(mess: Mess) -> Self {
        MessResponse {
            id: mess.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: mess.name,
            owner_id: mess.owner_id.to_hex(),
            address: mess.address,
        }
    }
}
