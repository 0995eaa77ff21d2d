//! Sessions and the in-memory session store.
//!
//! A session is a time-bounded proof of authentication. Expiry is fixed at
//! creation (`created_at + lifetime`) and is **not** extended by activity:
//! `last_activity` is recorded as telemetry on every resolve but never feeds
//! back into the expiry computation. There is no background sweeper — expiry
//! is evaluated lazily on every read, and an expired session is marked
//! inactive the first time it is observed, so it behaves as logged out from
//! that point on.
//!
//! Tokens are 32 bytes from a CSPRNG, base64-url encoded, and redacted from
//! `Debug` output so they cannot leak through logs.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use uuid::Uuid;

use crate::role::Role;
use crate::user::User;

/// Raw entropy per token, before encoding.
const TOKEN_BYTES: usize = 32;

/// Opaque, unguessable session token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::rng().random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The encoded token value, for transport to the caller.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// Tokens are bearer credentials; keep them out of Debug output.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Where a login came from, for the audit trail.
#[derive(Debug, Clone, Default)]
pub struct Origin {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: Uuid,
    /// Denormalized from the user record at login for cheap checks.
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
    /// Telemetry only; does not extend `expires_at`.
    pub last_activity: DateTime<Utc>,
}

impl Session {
    /// Usable iff still marked active and not past expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }
}

/// In-memory session store keyed by token.
///
/// Internally synchronized; share via `Arc`.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a user. The token is the only handle returned to
    /// the caller.
    pub fn create(&self, user: &User, lifetime: Duration, origin: Origin) -> SessionToken {
        let token = SessionToken::generate();
        let now = Utc::now();
        // Sub-second lifetimes keep their value; a lifetime too large to
        // represent saturates to the maximum instant instead of wrapping.
        let expires_at = chrono::Duration::from_std(lifetime)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let session = Session {
            token: token.clone(),
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            created_at: now,
            expires_at,
            ip_address: origin.ip_address,
            user_agent: origin.user_agent,
            is_active: true,
            last_activity: now,
        };

        self.sessions.write().insert(token.clone(), session);
        token
    }

    /// Resolve a token to its session, applying lazy expiry.
    ///
    /// Returns `None` for unknown, inactive, or expired tokens. An expired
    /// session is marked inactive here, atomically with the check, so a token
    /// racing its own expiry cannot be used twice.
    pub fn resolve(&self, token: &SessionToken) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(token)?;

        if !session.is_active {
            return None;
        }

        let now = Utc::now();
        if now >= session.expires_at {
            session.is_active = false;
            tracing::debug!(
                user_id = %session.user_id,
                username = %session.username,
                "Session expired"
            );
            return None;
        }

        session.last_activity = now;
        Some(session.clone())
    }

    /// Mark a session inactive. Returns the session as it was, or `None` if
    /// the token is unknown or already inactive — logout is idempotent.
    pub fn invalidate(&self, token: &SessionToken) -> Option<Session> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(token)?;
        if !session.is_active {
            return None;
        }
        session.is_active = false;
        Some(session.clone())
    }

    /// Invalidate every active session owned by a user (deactivation,
    /// password change/reset). Returns how many were invalidated.
    pub fn invalidate_for_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write();
        let mut count = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.is_active {
                session.is_active = false;
                count += 1;
            }
        }
        count
    }

    /// Number of sessions currently marked active (expired-but-unobserved
    /// sessions count until first resolve).
    pub fn active_count(&self) -> usize {
        self.sessions.read().values().filter(|s| s.is_active).count()
    }
}
