pub mod mess;
pub mod plan;
pub mod subscription;
pub mod meal_pass;
pub mod check_in;

pub use mess::*;
pub use plan::*;
pub use subscription::*;
pub use meal_pass::*;
pub use check_in::*;
