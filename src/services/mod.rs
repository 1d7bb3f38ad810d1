pub mod checkins;
pub mod jwt;
pub mod meal_pass;
pub mod mess;
pub mod subscriptions;
pub mod sweeper;

#[cfg(test)]
pub mod testing;

pub use checkins::CheckInService;
pub use jwt::JwtService;
pub use meal_pass::MealPassService;
pub use mess::MessService;
pub use subscriptions::SubscriptionService;
pub use sweeper::{ExpirySweeper, SweeperHandle};
