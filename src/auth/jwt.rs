use jsonwebtoken::{decode, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// Claims of an access token minted by the identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

pub fn verify_token(
    token: &str,
    config: &Config,
) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
}

/// Mint a token the way the identity provider does. Only tests need this.
#[cfg(test)]
pub fn create_token(
    user_id: Uuid,
    token_type: TokenType,
    ttl_secs: i64,
    config: &Config,
) -> String {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: String::new(),
        exp: (now + Duration::seconds(ttl_secs)).timestamp(),
        iat: now.timestamp(),
        token_type,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .expect("token encodes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_subject() {
        let config = Config::test_default();
        let user_id = Uuid::new_v4();
        let token = create_token(user_id, TokenType::Access, 60, &config);

        let data = verify_token(&token, &config).unwrap();
        assert_eq!(data.claims.sub, user_id);
        assert_eq!(data.claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_rejects_expired_token() {
        let config = Config::test_default();
        let token = create_token(Uuid::new_v4(), TokenType::Access, -3600, &config);
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn test_rejects_foreign_secret() {
        let config = Config::test_default();
        let token = create_token(Uuid::new_v4(), TokenType::Access, 60, &config);

        let mut other = Config::test_default();
        other.jwt_secret = "someone-else".into();
        assert!(verify_token(&token, &other).is_err());
    }
}
