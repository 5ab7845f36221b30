use std::time::Duration;

use axum::extract::FromRef;
use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState};

/// Why a token was refused. Only ever logged; clients see a plain 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token issuer or audience is not accepted")]
    InvalidClaims,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
            _ => TokenError::Malformed,
        }
    }
}

/// HS256 signing and verification keys, built once from config.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
    validation: Validation,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = cfg.leeway_secs;
        validation.set_audience(std::slice::from_ref(&cfg.audience));
        validation.set_issuer(std::slice::from_ref(&cfg.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64).saturating_mul(60)),
            validation,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` valid for the configured TTL from now.
    pub fn issue(&self, subject: &str) -> anyhow::Result<String> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(&self, subject: &str, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?;
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(subject = %subject, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    /// Structure, then signature, then expiry and issuer/audience.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        check_structure(token)?;
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        debug!(subject = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Three segments; header and payload must be base64url-encoded JSON objects.
fn check_structure(token: &str) -> Result<(), TokenError> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };
    decode_header(token).map_err(|_| TokenError::Malformed)?;
    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&bytes)
        .map_err(|_| TokenError::Malformed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60,
            leeway_secs: 0,
        }
    }

    fn make_keys_from(c: &JwtConfig) -> JwtKeys {
        JwtKeys::new(c)
    }

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&cfg(secret, "test-issuer", "test-aud"))
    }

    #[test]
    fn issue_and_verify() {
        let keys = make_keys("dev-secret");
        let token = keys.issue("alice").expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn tokens_issued_at_different_instants_differ() {
        let keys = make_keys("dev-secret");
        let now = OffsetDateTime::now_utc();
        let a = keys.issue_at("alice", now).unwrap();
        let b = keys.issue_at("alice", now + TimeDuration::seconds(5)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys("dev-secret");
        let two_hours_ago = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let token = keys.issue_at("alice", two_hours_ago).unwrap();
        assert_eq!(keys.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn foreign_secret_is_bad_signature() {
        let ours = make_keys("our-secret");
        let theirs = make_keys("their-secret");
        let token = theirs.issue("alice").unwrap();
        assert_eq!(ours.verify(&token).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn bad_signature_wins_over_expiry() {
        let ours = make_keys("our-secret");
        let theirs = make_keys("their-secret");
        let old = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let token = theirs.issue_at("alice", old).unwrap();
        assert_eq!(ours.verify(&token).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn garbage_is_malformed() {
        let keys = make_keys("dev-secret");
        assert_eq!(keys.verify("not-a-jwt").unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify("").unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify("a.b.c").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn undecodable_payload_is_malformed_even_when_signed() {
        let keys = make_keys("dev-secret");
        let token = keys.issue("alice").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let not_base64 = format!("{}.!!!not-base64!!!.{}", parts[0], parts[2]);
        assert_eq!(keys.verify(&not_base64).unwrap_err(), TokenError::Malformed);

        let not_json = format!(
            "{}.{}.{}",
            parts[0],
            Base64UrlUnpadded::encode_string(b"plain text"),
            parts[2]
        );
        assert_eq!(keys.verify(&not_json).unwrap_err(), TokenError::Malformed);

        let extra_segment = format!("{token}.extra");
        assert_eq!(keys.verify(&extra_segment).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn huge_ttl_fails_to_issue_instead_of_panicking() {
        let mut c = cfg("dev-secret", "iss", "aud");
        c.ttl_minutes = 1_000_000_000_000_000;
        assert!(make_keys_from(&c).issue("alice").is_err());

        c.ttl_minutes = i64::MAX;
        assert!(make_keys_from(&c).issue("alice").is_err());
    }

    #[test]
    fn tampered_payload_is_bad_signature() {
        let keys = make_keys("dev-secret");
        let token = keys.issue("alice").unwrap();
        let other = keys.issue("mallory").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let other_parts: Vec<&str> = other.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], other_parts[1], parts[2]);
        assert_eq!(keys.verify(&forged).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn wrong_issuer_or_audience_is_invalid_claims() {
        let good = JwtKeys::new(&cfg("same-secret", "good-iss", "good-aud"));
        let bad = JwtKeys::new(&cfg("same-secret", "bad-iss", "bad-aud"));
        let token = good.issue("alice").unwrap();
        assert_eq!(bad.verify(&token).unwrap_err(), TokenError::InvalidClaims);
    }
}
