use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::types::{Claims, Subject};

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_hours: i64,
}

impl JwtService {
    pub fn new(secret: &str, expiration_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            expiration_hours,
        }
    }

    pub fn generate_token(&self, subject: &Subject) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.expiration_hours);

        let claims = Claims {
            sub: subject.id.clone(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_roles() {
        let jwt = JwtService::new("test-secret", 1);
        let subject = Subject::new("u-1").with_roles(["admin", "editor"]);

        let token = jwt.generate_token(&subject).unwrap();
        let claims = jwt.verify_token(&token).unwrap();

        assert_eq!(Subject::from(claims), subject);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = JwtService::new("one", 1)
            .generate_token(&Subject::new("u-1"))
            .unwrap();
        assert!(JwtService::new("two", 1).verify_token(&token).is_err());
    }
}
