use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Advisory per-caller metadata. Never consulted for authorization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub protocol_version: String,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Sessions keyed by caller. The TTL runs from creation and is not extended
/// by later calls.
#[derive(Debug)]
pub struct SessionManager {
    ttl: Duration,
    protocol_version: String,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new(ttl_minutes: i64, protocol_version: impl Into<String>) -> Self {
        Self {
            ttl: Duration::minutes(ttl_minutes.max(1)),
            protocol_version: protocol_version.into(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the caller's active session, creating a fresh one when there is
    /// none or the previous one has expired.
    pub fn touch(&self, caller: &str) -> Session {
        self.touch_at(caller, Utc::now())
    }

    pub fn touch_at(&self, caller: &str, now: DateTime<Utc>) -> Session {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, session| !session.is_expired_at(now));

        if let Some(session) = sessions.get(caller) {
            return session.clone();
        }

        let session = Session {
            id: Uuid::now_v7().to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            protocol_version: self.protocol_version.clone(),
        };
        tracing::debug!(session_id = %session.id, "mcp session created");
        sessions.insert(caller.to_string(), session.clone());
        session
    }

    /// Drop the caller's session. Returns whether an active one existed.
    pub fn terminate(&self, caller: &str) -> bool {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.remove(caller) {
            Some(session) => !session.is_expired_at(now),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_creates_and_later_touches_reuse() {
        let manager = SessionManager::new(60, "2024-11-05");
        let first = manager.touch("caller-a");
        let second = manager.touch("caller-a");
        assert_eq!(first, second);
        assert_eq!(first.protocol_version, "2024-11-05");
        assert_eq!(first.expires_at - first.created_at, Duration::minutes(60));
    }

    #[test]
    fn ttl_is_not_extended_by_later_calls() {
        let manager = SessionManager::new(10, "2024-11-05");
        let start = Utc::now();
        let created = manager.touch_at("caller-a", start);
        let later = manager.touch_at("caller-a", start + Duration::minutes(9));
        assert_eq!(later.expires_at, created.expires_at);
    }

    #[test]
    fn expired_session_is_replaced_on_next_call() {
        let manager = SessionManager::new(10, "2024-11-05");
        let start = Utc::now() - Duration::minutes(30);
        let old = manager.touch_at("caller-a", start);

        let fresh = manager.touch_at("caller-a", start + Duration::minutes(11));
        assert_ne!(fresh.id, old.id);
        assert_eq!(fresh.created_at, start + Duration::minutes(11));
    }

    #[test]
    fn session_is_active_through_its_expiry_instant() {
        let manager = SessionManager::new(10, "2024-11-05");
        let start = Utc::now();
        let created = manager.touch_at("caller-a", start);

        assert!(!created.is_expired_at(created.expires_at));
        assert!(created.is_expired_at(created.expires_at + Duration::nanoseconds(1)));

        let at_expiry = manager.touch_at("caller-a", created.expires_at);
        assert_eq!(at_expiry.id, created.id);

        let after = manager.touch_at("caller-a", created.expires_at + Duration::nanoseconds(1));
        assert_ne!(after.id, created.id);
    }

    #[test]
    fn callers_do_not_share_sessions() {
        let manager = SessionManager::new(60, "2024-11-05");
        let a = manager.touch("caller-a");
        let b = manager.touch("caller-b");
        assert_ne!(a.id, b.id);
        assert_eq!(manager.touch("caller-a"), a);
    }

    #[test]
    fn terminate_reports_whether_a_live_session_existed() {
        let manager = SessionManager::new(5, "2024-11-05");
        manager.touch("caller-a");
        assert!(manager.terminate("caller-a"));
        assert!(!manager.terminate("caller-a"));

        manager.touch_at("caller-b", Utc::now() - Duration::minutes(10));
        assert!(!manager.terminate("caller-b"));
    }

    #[test]
    fn ttl_has_a_floor_of_one_minute() {
        let session = SessionManager::new(0, "v").touch("caller-a");
        assert_eq!(session.expires_at - session.created_at, Duration::minutes(1));
    }
}
