use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::{AuthGuard, OwnerGuard};
use crate::models::{BlockPassDto, CurrentPassResponse, MealPassResponse, ValidatePassDto, ValidationResponse};
use crate::services::{MealPassService, MessService};
use crate::utils::{parse_object_id, ApiError, ApiResponse, SharedClock};

/// Check a scanned QR code at the caller's mess
#[openapi(tag = "Meal Pass")]
#[post("/mealpass/validate/<mess_id>", data = "<dto>")]
pub async fn validate_pass(
    mess_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Json<ValidatePassDto>,
) -> Result<Json<ApiResponse<ValidationResponse>>, ApiError> {
    let store = db.inner().as_ref();
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    MessService::owned_by(store, mess_id, &owner.auth).await?;

    let result = MealPassService::validate(store, clock.inner().as_ref(), &dto.qr_code, mess_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Meal pass is valid".to_string(),
        result,
    )))
}

#[openapi(tag = "Meal Pass")]
#[get("/mealpass/current/<user_id>")]
pub async fn current_passes(
    user_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<CurrentPassResponse>>>, ApiError> {
    let user_id = parse_object_id(&user_id, "user ID")?;
    let passes = MealPassService::current_for_user(db.inner().as_ref(), clock.inner().as_ref(), &auth, user_id).await?;

    Ok(Json(ApiResponse::success(passes)))
}

#[openapi(tag = "Meal Pass")]
#[put("/mealpass/<pass_id>/block", data = "<dto>")]
pub async fn block_pass(
    pass_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Json<BlockPassDto>,
) -> Result<Json<ApiResponse<MealPassResponse>>, ApiError> {
    let pass_id = parse_object_id(&pass_id, "meal pass ID")?;
    let pass = MealPassService::set_blocked(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, pass_id, dto.into_inner())
        .await?;

    let message = if pass.is_blocked { "Meal pass blocked" } else { "Meal pass unblocked" };
    Ok(Json(ApiResponse::success_with_message(message.to_string(), pass.into())))
}
