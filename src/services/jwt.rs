use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Account role carried in the token.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    MessOwner,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

/// Tokens are minted by the account service; this side only verifies them.
pub struct JwtService;

impl JwtService {
    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Self::verify_with_secret(token, &crate::config::Config::jwt_secret())
    }

    pub fn verify_with_secret(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::issue_token;
    use super::*;
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn verifies_role_and_subject() {
        let user_id = ObjectId::new();
        let token = issue_token(&user_id, Role::MessOwner, "test-secret");

        let claims = JwtService::verify_with_secret(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.role, Role::MessOwner);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = issue_token(&ObjectId::new(), Role::User, "test-secret");
        assert!(JwtService::verify_with_secret(&token, "other-secret").is_err());
    }
}
