pub mod clock;
pub mod response;
pub mod validation;

pub use clock::{Clock, SharedClock, SystemClock};
pub use response::{ApiError, ApiResponse};
pub use validation::{parse_object_id, validate_day, validate_price};
