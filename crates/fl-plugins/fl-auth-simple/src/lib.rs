//! # fl-auth-simple
//!
//! Argon2 + HMAC-SHA256 implementation of `AuthProvider`.
//! Handles password hashing, signed session cookies, CSRF tokens and the
//! arithmetic login captcha. Nothing here touches storage.

use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use fl_core::models::Captcha;
use fl_core::traits::AuthProvider;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
const CAPTCHA_TTL: Duration = Duration::from_secs(10 * 60);

pub struct SimpleAuthProvider {
    /// Keyed with the server secret; cloned per signature.
    mac: HmacSha256,
    session_ttl: Duration,
}

impl SimpleAuthProvider {
    /// Accepts the server secret (e.g., from an environment variable)
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        if secret.len() < 16 {
            anyhow::bail!("session secret must be at least 16 bytes");
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|e| anyhow::anyhow!("session secret: {e}"))?;
        Ok(Self { mac, session_ttl: DEFAULT_SESSION_TTL })
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify_signature(&self, payload: &str, signature: &str) -> bool {
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&raw).is_ok()
    }

    /// `issued` must be in the past and no older than `ttl`.
    fn fresh(issued: &str, ttl: Duration) -> bool {
        let Ok(issued) = issued.parse::<i64>() else {
            return false;
        };
        let age = Utc::now().timestamp() - issued;
        age >= 0 && (age as u64) <= ttl.as_secs()
    }
}

impl AuthProvider for SimpleAuthProvider {
    fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("hashing password: {e}"))?;
        Ok(hash.to_string())
    }

    /// Verifies if a provided password matches a stored Argon2 hash.
    fn verify_password(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(p) => p,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// `<user id>.<issued unix secs>.<hex hmac>`
    fn issue_session(&self, user_id: Uuid) -> String {
        let payload = format!("{user_id}.{}", Utc::now().timestamp());
        let signature = self.sign(&format!("session|{payload}"));
        format!("{payload}.{signature}")
    }

    fn resolve_session(&self, token: &str) -> Option<Uuid> {
        let mut parts = token.splitn(3, '.');
        let (user, issued, signature) = (parts.next()?, parts.next()?, parts.next()?);
        if !self.verify_signature(&format!("session|{user}.{issued}"), signature) {
            return None;
        }
        if !Self::fresh(issued, self.session_ttl) {
            return None;
        }
        Uuid::parse_str(user).ok()
    }

    fn issue_csrf_token(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn verify_csrf(&self, expected: &str, presented: &str) -> bool {
        !expected.is_empty() && expected.as_bytes().ct_eq(presented.as_bytes()).into()
    }

    /// "What is a + b?" with a, b in 1..=9. The token binds the answer without
    /// revealing it: `<issued>.<nonce>.<hex hmac>`.
    fn create_captcha(&self) -> Captcha {
        let mut rng = rand::thread_rng();
        let (a, b): (u32, u32) = (rng.gen_range(1..=9), rng.gen_range(1..=9));
        let answer = (a + b).to_string();
        let payload = format!("{}.{}", Utc::now().timestamp(), Uuid::new_v4().simple());
        let signature = self.sign(&format!("captcha|{payload}|{answer}"));
        Captcha {
            question: format!("What is {a} + {b}?"),
            answer,
            token: format!("{payload}.{signature}"),
        }
    }

    fn verify_captcha(&self, answer: &str, token: &str) -> bool {
        let mut parts = token.splitn(3, '.');
        let (Some(issued), Some(nonce), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };
        let answer = answer.trim();
        Self::fresh(issued, CAPTCHA_TTL)
            && self.verify_signature(&format!("captcha|{issued}.{nonce}|{answer}"), signature)
    }
}
