use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use serde::Serialize;
use rocket_okapi::okapi::schemars::JsonSchema;

use crate::db::DbConn;
use crate::guards::{AuthGuard, OwnerGuard};
use crate::models::{
    ActivateSubscriptionDto, CreatePlanDto, PlanResponse, SubscribeDto, SubscriptionDetails,
    SubscriptionResponse, UpdatePlanDto,
};
use crate::services::SubscriptionService;
use crate::utils::{parse_object_id, ApiError, ApiResponse, SharedClock};

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanRemoval {
    pub plan_id: String,
    pub affected_subscriptions: u64,
}

/* ----------------------------- PLANS ----------------------------- */

#[openapi(tag = "Subscription Plans")]
#[post("/subscriptions/plans", data = "<dto>")]
pub async fn create_plan(
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Json<CreatePlanDto>,
) -> Result<Json<ApiResponse<PlanResponse>>, ApiError> {
    let plan = SubscriptionService::create_plan(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, dto.into_inner()).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscription plan created successfully".to_string(),
        plan.into(),
    )))
}

#[openapi(tag = "Subscription Plans")]
#[put("/subscriptions/plans/<plan_id>", data = "<dto>")]
pub async fn update_plan(
    plan_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Json<UpdatePlanDto>,
) -> Result<Json<ApiResponse<PlanResponse>>, ApiError> {
    let plan_id = parse_object_id(&plan_id, "plan ID")?;
    let plan = SubscriptionService::update_plan(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, plan_id, dto.into_inner())
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscription plan updated successfully".to_string(),
        plan.into(),
    )))
}

/// Delete a plan; every subscription to it becomes "Plan Removed"
#[openapi(tag = "Subscription Plans")]
#[delete("/subscriptions/plans/<plan_id>/<mess_id>")]
pub async fn delete_plan(
    plan_id: String,
    mess_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
) -> Result<Json<ApiResponse<PlanRemoval>>, ApiError> {
    let plan = parse_object_id(&plan_id, "plan ID")?;
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    let affected = SubscriptionService::delete_plan(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, plan, mess_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscription plan deleted successfully".to_string(),
        PlanRemoval {
            plan_id,
            affected_subscriptions: affected,
        },
    )))
}

#[openapi(tag = "Subscription Plans")]
#[get("/subscriptions/mess/<mess_id>/plans")]
pub async fn get_mess_plans(
    mess_id: String,
    db: &State<DbConn>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<PlanResponse>>>, ApiError> {
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    let plans = SubscriptionService::list_plans(db.inner().as_ref(), Some(mess_id)).await?;

    Ok(Json(ApiResponse::success(plans.into_iter().map(PlanResponse::from).collect())))
}

#[openapi(tag = "Subscription Plans")]
#[get("/subscriptions/plans")]
pub async fn get_all_plans(
    db: &State<DbConn>,
    _auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<PlanResponse>>>, ApiError> {
    let plans = SubscriptionService::list_plans(db.inner().as_ref(), None).await?;

    Ok(Json(ApiResponse::success(plans.into_iter().map(PlanResponse::from).collect())))
}

/* ----------------------------- SUBSCRIPTIONS ----------------------------- */

/// Subscribe the caller to a plan. The subscription starts out Pending.
#[openapi(tag = "Subscriptions")]
#[post("/subscriptions/subscribe", data = "<dto>")]
pub async fn subscribe(
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    auth: AuthGuard,
    dto: Json<SubscribeDto>,
) -> Result<Json<ApiResponse<SubscriptionResponse>>, ApiError> {
    let plan_id = parse_object_id(&dto.plan_id, "plan ID")?;
    let requested_user = dto
        .user_id
        .as_deref()
        .map(|raw| parse_object_id(raw, "user ID"))
        .transpose()?;

    let sub = SubscriptionService::subscribe(db.inner().as_ref(), clock.inner().as_ref(), &auth, plan_id, requested_user).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscribed successfully".to_string(),
        sub.into(),
    )))
}

#[openapi(tag = "Subscriptions")]
#[get("/subscriptions/user/<user_id>")]
pub async fn get_user_subscriptions(
    user_id: String,
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<SubscriptionDetails>>>, ApiError> {
    let user_id = parse_object_id(&user_id, "user ID")?;
    let subscriptions = SubscriptionService::list_for_user(db.inner().as_ref(), &auth, user_id).await?;

    Ok(Json(ApiResponse::success(subscriptions)))
}

#[openapi(tag = "Subscriptions")]
#[get("/subscriptions/mess/<mess_id>/subscribers")]
pub async fn get_mess_subscriptions(
    mess_id: String,
    db: &State<DbConn>,
    owner: OwnerGuard,
) -> Result<Json<ApiResponse<Vec<SubscriptionDetails>>>, ApiError> {
    let mess_id = parse_object_id(&mess_id, "mess ID")?;
    let subscriptions = SubscriptionService::list_for_mess(db.inner().as_ref(), &owner.auth, mess_id).await?;

    Ok(Json(ApiResponse::success(subscriptions)))
}

#[openapi(tag = "Subscriptions")]
#[put("/subscriptions/cancel/<subscription_id>")]
pub async fn cancel_subscription(
    subscription_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<SubscriptionResponse>>, ApiError> {
    let subscription_id = parse_object_id(&subscription_id, "subscription ID")?;
    let sub = SubscriptionService::cancel(db.inner().as_ref(), clock.inner().as_ref(), &auth, subscription_id).await?;

    Ok(Json(ApiResponse::success_with_message(
        "Subscription cancelled".to_string(),
        sub.into(),
    )))
}

/// Activate a subscription, or force another status, as the mess owner.
/// Without a body (or with `{}`) the dates are recomputed and the status kept.
#[openapi(tag = "Subscriptions")]
#[put("/subscriptions/<subscription_id>/activate", data = "<dto>", rank = 2)]
pub async fn activate_subscription(
    subscription_id: String,
    db: &State<DbConn>,
    clock: &State<SharedClock>,
    owner: OwnerGuard,
    dto: Option<Json<ActivateSubscriptionDto>>,
) -> Result<Json<ApiResponse<SubscriptionResponse>>, ApiError> {
    let subscription_id = parse_object_id(&subscription_id, "subscription ID")?;
    let dto = dto.map(Json::into_inner).unwrap_or_default();
    let sub =
        SubscriptionService::activate(db.inner().as_ref(), clock.inner().as_ref(), &owner.auth, subscription_id, dto)
            .await?;

    Ok(Json(ApiResponse::success_with_message(
        format!("Subscription is now {}", sub.status.as_str()),
        sub.into(),
    )))
}
