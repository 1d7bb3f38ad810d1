use rocket::request::{self, Request, FromRequest, Outcome};
use rocket::http::Status;
use rocket_okapi::request::OpenApiFromRequest;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::request::RequestHeaderInput;

use crate::guards::AuthGuard;

/// Authenticated caller holding the mess-owner role.
pub struct OwnerGuard {
    pub auth: AuthGuard,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OwnerGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) if auth.is_mess_owner() => Outcome::Success(OwnerGuard { auth }),
            Outcome::Success(auth) => {
                log::debug!("Owner guard rejected user {} with role {:?}", auth.user_id, auth.role);
                Outcome::Error((Status::Forbidden, ()))
            }
            Outcome::Error(e) => Outcome::Error(e),
            Outcome::Forward(f) => Outcome::Forward(f),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for OwnerGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
