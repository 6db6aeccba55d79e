//! Approval Manager (C7): gates tool calls matching the configured
//! approval policy behind human confirmation.
//!
//! The decision itself lives in storage, not in process memory:
//! `await_approval` (in `::tools`) publishes an `approval_request`
//! notification and polls `core:approval:{correlationId}` every 500ms for
//! an `approve`/`deny` answer, so an approval can be resolved by the REST
//! handlers below, by a WS client writing straight to the KV key, or by
//! any other process sharing the same store. [`ApprovalStore`] only keeps
//! an in-process index of what's outstanding, for dashboard listings —
//! losing it (a restart) loses the listing, not the approval contract.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

/// TTL on the `core:approval:{correlationId}` answer key, per spec §6.
pub const APPROVAL_ANSWER_TTL_MS: u64 = 180_000;

/// The decision a human reviewer recorded via `core:approval:{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: Option<String> },
}

impl ApprovalDecision {
    /// Encode as the literal KV answer value: `"approve"` or
    /// `"deny"`/`"deny:<reason>"`.
    pub fn encode(&self) -> String {
        match self {
            Self::Approved => "approve".to_string(),
            Self::Denied { reason: None } => "deny".to_string(),
            Self::Denied { reason: Some(r) } => format!("deny:{r}"),
        }
    }

    /// Parse a `core:approval:{id}` value back into a decision. Anything
    /// that isn't a recognized `approve`/`deny[:reason]` string is treated
    /// as a denial quoting the unparseable value, matching the spec's
    /// fail-closed stance on approval.
    pub fn parse(raw: &str) -> Self {
        if raw == "approve" {
            return Self::Approved;
        }
        match raw.strip_prefix("deny") {
            Some(rest) => {
                let reason = rest.strip_prefix(':').map(str::to_string).filter(|r| !r.is_empty());
                Self::Denied { reason }
            }
            None => Self::Denied { reason: Some(format!("unrecognized approval answer: {raw}")) },
        }
    }
}

/// An approval awaiting a human answer, tracked only for listing — the
/// correlation id is the join key against `core:approval:{id}`.
#[derive(Debug, Clone)]
pub struct PendingApproval {
    pub id: Uuid,
    pub command: String,
    pub session_key: String,
    pub created_at: DateTime<Utc>,
}

/// Serializable snapshot of a pending approval (for API responses / SSE events).
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalInfo {
    pub id: Uuid,
    pub command: String,
    pub session_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<&PendingApproval> for ApprovalInfo {
    fn from(p: &PendingApproval) -> Self {
        Self {
            id: p.id,
            command: p.command.clone(),
            session_key: p.session_key.clone(),
            created_at: p.created_at,
        }
    }
}

/// In-process index of outstanding approvals, for `GET .../pending`.
pub struct ApprovalStore {
    pending: RwLock<HashMap<Uuid, PendingApproval>>,
    timeout: Duration,
}

impl ApprovalStore {
    /// Create a new store with the given approval timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// The configured approval timeout duration (default 120s per spec §4.7).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Index a newly-requested approval. Returns the serializable info
    /// snapshot for the `approval_request` notification payload.
    pub fn insert(&self, approval: PendingApproval) -> ApprovalInfo {
        let info = ApprovalInfo::from(&approval);
        self.pending.write().insert(approval.id, approval);
        info
    }

    /// Drop an approval from the index once its `core:approval:{id}`
    /// answer has been consumed (approved, denied, or timed out).
    pub fn remove(&self, id: &Uuid) -> bool {
        self.pending.write().remove(id).is_some()
    }

    /// List all currently pending approvals (for dashboard introspection).
    pub fn list_pending(&self) -> Vec<ApprovalInfo> {
        self.pending
            .read()
            .values()
            .map(ApprovalInfo::from)
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> ApprovalStore {
        ApprovalStore::new(Duration::from_secs(300))
    }

    fn make_pending() -> PendingApproval {
        PendingApproval {
            id: Uuid::new_v4(),
            command: "rm -rf /tmp/test".into(),
            session_key: "sk_test".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_list() {
        let store = make_store();
        let pending = make_pending();
        let id = pending.id;
        store.insert(pending);

        let list = store.list_pending();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
    }

    #[test]
    fn remove_resolved() {
        let store = make_store();
        let pending = make_pending();
        let id = pending.id;
        store.insert(pending);

        assert!(store.remove(&id));
        assert!(store.list_pending().is_empty());
    }

    #[test]
    fn remove_nonexistent_returns_false() {
        let store = make_store();
        assert!(!store.remove(&Uuid::new_v4()));
    }

    #[test]
    fn timeout_returns_configured_duration() {
        let store = ApprovalStore::new(Duration::from_secs(60));
        assert_eq!(store.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn decision_round_trips_through_encode_parse() {
        assert_eq!(ApprovalDecision::parse("approve"), ApprovalDecision::Approved);
        assert_eq!(
            ApprovalDecision::parse(&ApprovalDecision::Approved.encode()),
            ApprovalDecision::Approved
        );
        let denied = ApprovalDecision::Denied { reason: Some("too risky".into()) };
        assert_eq!(ApprovalDecision::parse(&denied.encode()), denied);
    }

    #[test]
    fn bare_deny_has_no_reason() {
        assert_eq!(ApprovalDecision::parse("deny"), ApprovalDecision::Denied { reason: None });
    }

    #[test]
    fn unrecognized_answer_denies_fail_closed() {
        match ApprovalDecision::parse("maybe?") {
            ApprovalDecision::Denied { reason: Some(r) } => assert!(r.contains("maybe?")),
            other => panic!("expected a denial, got {other:?}"),
        }
    }
}
