//! Usage-access permission gate.
//!
//! Sampling must not run while access is denied. The gate is consulted
//! before every poll; nothing is cached between checks.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// OS usage-access permission capability.
pub trait PermissionProvider: Send + Sync {
    /// Whether usage access is granted right now.
    fn check_access(&self) -> bool;

    /// Send the user to the OS settings screen for usage access.
    ///
    /// The outcome is not reported; call [`check_access`](Self::check_access)
    /// afterwards to observe it.
    fn request_access(&self);
}

/// Hosts without a usage-access gate.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionProvider for AlwaysGranted {
    fn check_access(&self) -> bool {
        true
    }

    fn request_access(&self) {}
}

/// Permission flag set by the embedder.
#[derive(Debug, Default, Clone)]
pub struct ManualPermission {
    granted: Arc<AtomicBool>,
    requests: Arc<AtomicU64>,
}

impl ManualPermission {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: Arc::new(AtomicBool::new(granted)),
            requests: Arc::default(),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// Number of times settings navigation was requested.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionProvider for ManualPermission {
    fn check_access(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_access(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Change in the gate's answer between two consecutive checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Granted,
    Denied,
}

/// Wraps a [`PermissionProvider`] and reports changes between checks.
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    last: Option<bool>,
}

impl PermissionGate {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            last: None,
        }
    }

    /// Query the provider.
    ///
    /// Returns the current answer and, when it differs from the previous
    /// check (or this is the first check), the change.
    pub fn check(&mut self) -> (bool, Option<AccessChange>) {
        let granted = self.provider.check_access();
        let change = if self.last == Some(granted) {
            None
        } else if granted {
            tracing::info!("Usage access granted, sampling enabled");
            Some(AccessChange::Granted)
        } else {
            tracing::warn!("Usage access not granted, sampling paused");
            Some(AccessChange::Denied)
        };
        self.last = Some(granted);
        (granted, change)
    }

    /// Forward a settings-navigation request to the provider.
    pub fn request_access(&self) {
        tracing::info!("Requesting usage access");
        self.provider.request_access();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_reports_transitions_once() {
        let permission = ManualPermission::new(false);
        let mut gate = PermissionGate::new(Arc::new(permission.clone()));

        assert_eq!(gate.check(), (false, Some(AccessChange::Denied)));
        assert_eq!(gate.check(), (false, None));

        permission.set_granted(true);
        assert_eq!(gate.check(), (true, Some(AccessChange::Granted)));
        assert_eq!(gate.check(), (true, None));
    }

    #[test]
    fn test_request_access_is_forwarded() {
        let permission = ManualPermission::new(false);
        let gate = PermissionGate::new(Arc::new(permission.clone()));

        gate.request_access();
        gate.request_access();

        assert_eq!(permission.request_count(), 2);
        assert!(!permission.check_access());
    }

    #[test]
    fn test_always_granted() {
        assert!(AlwaysGranted.check_access());
    }
}
