use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::OwnerGuard;
use crate::models::{CheckInQuery, CheckInResponse, CreateCheckInDto, MealStats};
use crate::services::{CheckInService, MessService};
use crate::utils::{parse_object_id, ApiError, ApiResponse, SharedClock};

/// Record a meal against a pass at the caller's mess
#[openapi(tag = "Check-ins")]
#[post("/checkins/<mess_id>", data = "<dto>")]
pub async fn record_check_in(
    mess_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Json<CreateCheckInDto>,
) -> Result<Json<ApiResponse<CheckInResponse>>, ApiError> {
    let store = db.inner().as_ref();
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    MessService::owned_by(store, mess_id, &owner.auth).await?;

    let meal_pass_id = parse_object_id(&dto.meal_pass_id, "meal pass ID")?;
    let check_in = CheckInService::record(store, clock.inner().as_ref(), meal_pass_id, &dto.meal_type, mess_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        format!("Checked in for {}", check_in.meal_type.as_str()),
        check_in.into(),
    )))
}

/// Check-ins at a mess, newest first. `date` is a local day, `YYYY-MM-DD`.
#[openapi(tag = "Check-ins")]
#[get("/checkins/<mess_id>?<query..>")]
pub async fn list_check_ins(
    mess_id: String,
    query: CheckInQuery,
    db: &State<DbConn>,
    owner: OwnerGuard,
) -> Result<Json<ApiResponse<Vec<CheckInResponse>>>, ApiError> {
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    let check_ins = CheckInService::list(db.inner().as_ref(), &owner.auth, mess_id, query).await?;

    Ok(Json(ApiResponse::success(
        check_ins.into_iter().map(CheckInResponse::from).collect(),
    )))
}

#[openapi(tag = "Check-ins")]
#[get("/checkins/today-stats/<mess_id>")]
pub async fn today_stats(
    mess_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
) -> Result<Json<ApiResponse<MealStats>>, ApiError> {
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    let stats = CheckInService::today_stats(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, mess_id).await?;

    Ok(Json(ApiResponse::success(stats)))
}
