use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::OwnerGuard;
use crate::guards::AuthGuard;
use crate::models::{CreateMessDto, MessResponse};
use crate::services::MessService;
use crate::utils::{parse_object_id, ApiError, ApiResponse, SharedClock};

/// Register a mess owned by the caller
#[openapi(tag = "Mess")]
#[post("/mess", data = "<dto>")]
pub async fn create_mess(
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Json<CreateMessDto>,
) -> Result<Json<ApiResponse<MessResponse>>, ApiError> {
    let mess = MessService::create(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Mess registered successfully".to_string(),
        mess.into(),
    )))
}

#[openapi(tag = "Mess")]
#[get("/mess/<mess_id>")]
pub async fn get_mess(
    mess_id: String,
    db: &State<DbConn>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<MessResponse>>, ApiError> {
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    let mess = MessService::get(db.inner().as_ref(), mess_id).await?;

    Ok(Json(ApiResponse::success(mess.into())))
}
