use mongodb::bson::oid::ObjectId;
use validator::Validate;

use crate::db::Store;
use crate::guards::AuthGuard;
use crate::models::{CreateMessDto, Mess};
use crate::utils::{ApiError, Clock};

pub struct MessService;

impl MessService {
    pub async fn create(
        store: &dyn Store,
        clock: &dyn Clock,
        caller: &AuthGuard,
        dto: CreateMessDto,
    ) -> Result<Mess, ApiError> {
        caller.require_mess_owner()?;
        dto.validate()
            .map_err(|e| ApiError::bad_request(format!("Invalid mess details: {}", e)))?;

        let now = clock.now_bson();
        let mess = Mess {
            id: None,
            name: dto.name.trim().to_string(),
            owner_id: caller.user_id,
            address: dto.address,
            created_at: now,
            updated_at: now,
        };

        let mess = store.insert_mess(mess).await?;
        log::info!("Mess {:?} registered by {}", mess.id, caller.user_id);
        Ok(mess)
    }

    pub async fn get(store: &dyn Store, mess_id: ObjectId) -> Result<Mess, ApiError> {
        store
            .find_mess(mess_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Mess not found"))
    }

    /// The mess, provided the caller is its owner.
    pub async fn owned_by(
        store: &dyn Store,
        mess_id: ObjectId,
        caller: &AuthGuard,
    ) -> Result<Mess, ApiError> {
        caller.require_mess_owner()?;
        let mess = Self::get(store, mess_id).await?;
        if mess.owner_id != caller.user_id {
            return Err(ApiError::forbidden("You do not own this mess"));
        }
        Ok(mess)
    }
}
