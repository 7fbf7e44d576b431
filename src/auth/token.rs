//! Compact HS256 tokens (`header.payload.signature`, base64url without padding).
//!
//! The payload is any JSON object; `iat` is always set, `exp` only when the
//! signer was built with a lifetime, and `jti` makes every issued token unique.

use crate::error::AuthError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use chrono::{Duration, Utc};
use ring::hmac;
use serde_json::{json, Value};

/// Issues and validates bearer tokens. Held by the server as `Arc<dyn TokenSigner>`.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, payload: &Value) -> Result<String, AuthError>;
    fn verify(&self, token: &str) -> Result<Value, AuthError>;
}

pub struct HmacTokenSigner {
    key: hmac::Key,
    ttl: Option<Duration>,
}

impl HmacTokenSigner {
    pub fn new(secret: &[u8], ttl: Option<Duration>) -> Self {
        HmacTokenSigner {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            ttl,
        }
    }
}

fn decode_json(part: &str) -> Result<Value, AuthError> {
    let bytes = B64.decode(part).map_err(|_| AuthError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::Malformed)
}

impl TokenSigner for HmacTokenSigner {
    fn sign(&self, payload: &Value) -> Result<String, AuthError> {
        let mut claims = payload
            .as_object()
            .cloned()
            .ok_or_else(|| AuthError::Signing("payload must be a JSON object".into()))?;
        let now = Utc::now();
        claims.insert("iat".into(), json!(now.timestamp()));
        if let Some(ttl) = self.ttl {
            claims.insert("exp".into(), json!((now + ttl).timestamp()));
        }
        claims.insert("jti".into(), json!(uuid::Uuid::new_v4().to_string()));

        let header = json!({"alg": "HS256", "typ": "JWT"});
        let header = serde_json::to_vec(&header).map_err(|e| AuthError::Signing(e.to_string()))?;
        let body = serde_json::to_vec(&claims).map_err(|e| AuthError::Signing(e.to_string()))?;
        let signing_input = format!("{}.{}", B64.encode(header), B64.encode(body));
        let tag = hmac::sign(&self.key, signing_input.as_bytes());
        Ok(format!("{}.{}", signing_input, B64.encode(tag.as_ref())))
    }

    fn verify(&self, token: &str) -> Result<Value, AuthError> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(body), Some(sig), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(AuthError::Malformed);
        };
        if decode_json(header)?.get("alg").and_then(Value::as_str) != Some("HS256") {
            return Err(AuthError::Malformed);
        }
        let sig = B64.decode(sig).map_err(|_| AuthError::Malformed)?;
        let signing_input_len = header.len() + 1 + body.len();
        let signing_input = &token.trim()[..signing_input_len];
        hmac::verify(&self.key, signing_input.as_bytes(), &sig).map_err(|_| AuthError::BadSignature)?;

        let claims = decode_json(body)?;
        if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
            if exp <= Utc::now().timestamp() {
                return Err(AuthError::Expired);
            }
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_verify_returns_claims() {
        let signer = HmacTokenSigner::new(b"secret", None);
        let token = signer.sign(&json!({"id": 1, "email": "a@x.io", "level": "user"})).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims["id"], json!(1));
        assert_eq!(claims["level"], json!("user"));
        assert!(claims["iat"].is_i64());
        assert!(claims.get("exp").is_none());
    }

    #[test]
    fn test_tampered_or_foreign_tokens_rejected() {
        let signer = HmacTokenSigner::new(b"secret", None);
        let token = signer.sign(&json!({"id": 1})).unwrap();

        let other = HmacTokenSigner::new(b"other", None);
        assert!(matches!(other.verify(&token), Err(AuthError::BadSignature)));

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = B64.encode(br#"{"id":2}"#);
        parts[1] = &forged;
        assert!(matches!(signer.verify(&parts.join(".")), Err(AuthError::BadSignature)));

        assert!(matches!(signer.verify("not-a-token"), Err(AuthError::Malformed)));
        assert!(matches!(signer.verify("a.b.c.d"), Err(AuthError::Malformed)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = HmacTokenSigner::new(b"secret", Some(Duration::seconds(-5)));
        let token = signer.sign(&json!({"id": 1})).unwrap();
        assert!(matches!(signer.verify(&token), Err(AuthError::Expired)));

        let fresh = HmacTokenSigner::new(b"secret", Some(Duration::seconds(60)));
        let claims = fresh.verify(&fresh.sign(&json!({"id": 1})).unwrap()).unwrap();
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_non_object_payload_is_a_signing_error() {
        let signer = HmacTokenSigner::new(b"secret", None);
        assert!(matches!(signer.sign(&json!([1, 2])), Err(AuthError::Signing(_))));
    }
}
