use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use regex::Regex;

use super::ApiError;

pub fn validate_day(day: &str) -> bool {
    let re = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    re.is_match(day) && NaiveDate::parse_from_str(day, "%Y-%m-%d").is_ok()
}

pub fn validate_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Parse a path or body id, naming the field in the error.
pub fn parse_object_id(value: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(value.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {}", what)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_format() {
        assert!(validate_day("2024-02-29"));
        assert!(!validate_day("2023-02-29"));
        assert!(!validate_day("29-02-2024"));
        assert!(!validate_day("2024-2-1"));
    }

    #[test]
    fn price_must_be_positive() {
        assert!(validate_price(49.5));
        assert!(!validate_price(0.0));
        assert!(!validate_price(-10.0));
        assert!(!validate_price(f64::NAN));
    }

    #[test]
    fn object_id_errors_name_the_field() {
        let err = parse_object_id("nope", "plan ID").unwrap_err();
        assert_eq!(err.message, "Invalid plan ID");
        assert!(parse_object_id("65a1b2c3d4e5f60718293a4b", "plan ID").is_ok());
    }
}
