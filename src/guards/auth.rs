use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use mongodb::bson::oid::ObjectId;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::services::jwt::Role;
use crate::utils::ApiError;

const TOKEN_COOKIE: &str = "token";

/// JWT-based authentication guard
#[derive(Debug, Clone)]
pub struct AuthGuard {
    pub user_id: ObjectId,
    pub role: Role,
}

impl AuthGuard {
    pub fn is_mess_owner(&self) -> bool {
        self.role == Role::MessOwner
    }

    pub fn require_mess_owner(&self) -> Result<(), ApiError> {
        if self.is_mess_owner() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only mess owners can perform this action"))
        }
    }

    pub fn require_user(&self) -> Result<(), ApiError> {
        if self.role == Role::User {
            Ok(())
        } else {
            Err(ApiError::forbidden("Only users can perform this action"))
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = req
            .headers()
            .get_one("Authorization")
            .map(|header| header.trim_start_matches("Bearer ").to_string())
            .or_else(|| req.cookies().get(TOKEN_COOKIE).map(|c| c.value().to_string()));

        match token {
            Some(token) => match crate::services::JwtService::verify_token(&token) {
                Ok(claims) => match ObjectId::parse_str(&claims.sub) {
                    Ok(user_id) => Outcome::Success(AuthGuard {
                        user_id,
                        role: claims.role,
                    }),
                    Err(_) => Outcome::Error((Status::Unauthorized, ())),
                },
                Err(_) => Outcome::Error((Status::Unauthorized, ())),
            },
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// === OpenAPI Integration (Fallback for older versions) ===
/// Keeps OpenAPI generation working even without new traits.
impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        // The guard doesn't contribute any special header/parameter for docs
        Ok(RequestHeaderInput::None)
    }
}
