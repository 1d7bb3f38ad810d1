pub mod checkins;
pub mod mealpass;
pub mod mess;
pub mod subscriptions;


use rocket::Route;
use rocket_okapi::openapi_get_routes;

/// Every API route plus `/openapi.json`, ready to mount under `/api/v1`.
pub fn api() -> Vec<Route> {
    openapi_get_routes![
        // Mess
        mess::create_mess,
        mess::get_mess,
        // Plans
        subscriptions::create_plan,
        subscriptions::update_plan,
        subscriptions::delete_plan,
        subscriptions::get_mess_plans,
        subscriptions::get_all_plans,
        // Subscriptions
        subscriptions::subscribe,
        subscriptions::get_user_subscriptions,
        subscriptions::get_mess_subscriptions,
        subscriptions::cancel_subscription,
        subscriptions::activate_subscription,
        // Check-ins
        checkins::record_check_in,
        checkins::list_check_ins,
        checkins::today_stats,
        // Meal pass
        mealpass::validate_pass,
        mealpass::current_passes,
        mealpass::block_pass,
    ]
}
