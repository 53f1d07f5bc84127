//! Per-login state: the login cycle and its one-shot dispatch latch.

use chrono::{DateTime, Utc};

use crate::mapping::GroupId;

/// Unique login identifier (16-byte random value, hex-encoded for logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoginId([u8; 16]);

impl LoginId {
    /// Generate a new random login ID.
    pub fn new() -> Self {
        Self(rand::random())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for LoginId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Customer account identifier in the host system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CustomerId(pub u64);

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One-shot latch for the "customer updated" notification.
///
/// Starts pending and can only move to dispatched. A new login cycle gets a
/// new latch; there is no reset.
#[derive(Debug, Default)]
pub struct DispatchLatch {
    dispatched: bool,
}

impl DispatchLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dispatched(&self) -> bool {
        self.dispatched
    }

    /// Mark the notification as dispatched.
    ///
    /// Returns `true` only for the call that moved the latch out of pending.
    pub fn mark_dispatched(&mut self) -> bool {
        !std::mem::replace(&mut self.dispatched, true)
    }
}

/// State of a single SSO login being processed.
///
/// Owned by the request handling the assertion and passed by `&mut` to the
/// processor, so nothing about one login is visible to another.
#[derive(Debug)]
pub struct LoginCycle {
    /// Login ID for log correlation.
    pub id: LoginId,

    /// Customer who just authenticated.
    pub customer_id: CustomerId,

    /// When processing of this login started.
    pub started_at: DateTime<Utc>,

    /// Group applied during this login, if any.
    pub applied_group: Option<GroupId>,

    latch: DispatchLatch,
}

impl LoginCycle {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            id: LoginId::new(),
            customer_id,
            started_at: Utc::now(),
            applied_group: None,
            latch: DispatchLatch::new(),
        }
    }

    pub fn latch(&self) -> &DispatchLatch {
        &self.latch
    }

    pub fn latch_mut(&mut self) -> &mut DispatchLatch {
        &mut self.latch
    }

    /// Whether the customer-updated notification already fired for this login.
    pub fn customer_update_dispatched(&self) -> bool {
        self.latch.is_dispatched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_id_hex() {
        let id = LoginId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.to_string(), hex);
        assert_ne!(id, LoginId::new());
    }

    #[test]
    fn test_cycle_records_start_time() {
        let before = Utc::now();
        let cycle = LoginCycle::new(CustomerId(9));
        assert!(cycle.started_at >= before);
        assert!(cycle.started_at <= Utc::now());
    }

    #[test]
    fn test_latch_starts_pending() {
        let latch = DispatchLatch::new();
        assert!(!latch.is_dispatched());
    }

    #[test]
    fn test_latch_is_one_shot() {
        let mut latch = DispatchLatch::new();
        assert!(latch.mark_dispatched());
        assert!(latch.is_dispatched());

        // Second call has no further effect
        assert!(!latch.mark_dispatched());
        assert!(latch.is_dispatched());
    }

    #[test]
    fn test_new_cycle_gets_fresh_latch() {
        let mut first = LoginCycle::new(CustomerId(42));
        first.latch_mut().mark_dispatched();
        assert!(first.customer_update_dispatched());

        let second = LoginCycle::new(CustomerId(42));
        assert!(!second.customer_update_dispatched());
        assert_ne!(first.id, second.id);
        assert!(second.applied_group.is_none());
    }
}
