//! HTTP Basic credential check with per-identity lockout.

use std::collections::HashMap;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::extract::FromRequestParts;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use rangehost_errors::ErrorCode;
use rangehost_primitives::Timestamp;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, trace, warn};

use crate::{ApiError, ApiState};

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(300);

/// Upper bound on identities with recorded failures.
const MAX_TRACKED_IDENTITIES: usize = 64;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Compares both fields without short-circuiting on the first mismatch.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass = self.password.as_bytes().ct_eq(password.as_bytes());
        (user & pass).into()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that lock an identity out.
    pub max_attempts: u32,
    pub lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout: DEFAULT_LOCKOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing credentials")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("invalid credentials for {user:?}")]
    InvalidCredentials { user: String },
    #[error("{user:?} is locked out for {retry_after_secs}s")]
    LockedOut { user: String, retry_after_secs: u64 },
}

impl AuthError {
    /// Whether the attempt counts as a failed login.
    pub fn is_failed_attempt(&self) -> bool {
        matches!(self, Self::InvalidCredentials { .. } | Self::LockedOut { .. })
    }
}

#[derive(Debug, Default)]
struct Attempts {
    failures: u32,
    locked_until: Option<Timestamp>,
    last_failure: Timestamp,
}

impl Attempts {
    fn is_locked(&self, now: Timestamp) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Verifies Basic credentials and locks out identities after repeated
/// failures.
#[derive(Debug)]
pub struct Authenticator {
    credentials: Credentials,
    policy: LockoutPolicy,
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl Authenticator {
    pub fn new(credentials: Credentials, policy: LockoutPolicy) -> Self {
        Self {
            credentials,
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Checks an `Authorization` header at `now`. Returns the user name.
    pub fn verify(&self, header: Option<&HeaderValue>, now: Timestamp) -> Result<String, AuthError> {
        let (user, password) = decode_basic(header.ok_or(AuthError::Missing)?)?;

        let mut attempts = self.attempts.lock();
        if let Some(entry) = attempts.get_mut(&user) {
            match entry.locked_until {
                Some(until) if until > now => {
                    return Err(AuthError::LockedOut {
                        retry_after_secs: (until - now).div_ceil(1000),
                        user,
                    });
                }
                Some(_) => *entry = Attempts::default(),
                None => {}
            }
        }

        if self.credentials.matches(&user, &password) {
            attempts.remove(&user);
            return Ok(user);
        }

        if !attempts.contains_key(&user) {
            make_room(&mut attempts, now);
        }
        let entry = attempts.entry(user.clone()).or_default();
        entry.failures += 1;
        entry.last_failure = now;
        if entry.failures >= self.policy.max_attempts {
            let lockout_ms = u64::try_from(self.policy.lockout.as_millis()).unwrap_or(u64::MAX);
            entry.failures = 0;
            entry.locked_until = Some(now.saturating_add(lockout_ms));
            warn!(%user, lockout_secs = self.policy.lockout.as_secs(), "identity locked out");
        }
        Err(AuthError::InvalidCredentials { user })
    }
}

/// Frees a slot for a new identity. Expired lockouts go first, then the
/// entry whose last failure is oldest, active lockouts last.
fn make_room(attempts: &mut HashMap<String, Attempts>, now: Timestamp) {
    if attempts.len() < MAX_TRACKED_IDENTITIES {
        return;
    }
    attempts.retain(|_, entry| entry.locked_until.is_none_or(|until| until > now));
    while attempts.len() >= MAX_TRACKED_IDENTITIES {
        let Some(oldest) = attempts
            .iter()
            .min_by_key(|(_, entry)| (entry.is_locked(now), entry.last_failure))
            .map(|(user, _)| user.clone())
        else {
            break;
        };
        trace!(user = %oldest, "forgetting failed attempts");
        attempts.remove(&oldest);
    }
}

fn decode_basic(header: &HeaderValue) -> Result<(String, String), AuthError> {
    let encoded = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Basic "))
        .ok_or(AuthError::Malformed)?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
    let (user, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;
    Ok((user.to_string(), password.to_string()))
}

/// Extractor guarding mutating routes. Holds the authenticated user name.
#[derive(Debug, Clone)]
pub struct Authorized(pub String);

impl FromRequestParts<ApiState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let now = state.host.clock().now_ms();
        match state.auth.verify(parts.headers.get(AUTHORIZATION), now) {
            Ok(user) => Ok(Self(user)),
            Err(err) => {
                if err.is_failed_attempt() {
                    metrics::counter!("api.auth_failures_total").increment(1);
                    state
                        .host
                        .error_log()
                        .record_host(ErrorCode::AuthenticationFailed, err.to_string());
                } else {
                    debug!(%err, uri = %parts.uri, "unauthenticated request");
                }
                Err(err.into())
            }
        }
    }
}
