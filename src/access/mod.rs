//! Admin access gate: a single shared secret.
//!
//! Verbatim string comparison, no hashing, no rate limiting, no expiry - a
//! known weak point carried over deliberately; the gate only keeps casual
//! users out of the admin surface. The secret persists as the fourth
//! independent entry in the state directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;

/// Secret in effect until the administrator changes it.
pub const DEFAULT_PASSCODE: &str = "Admin";

const PASSCODE_FILE: &str = "passcode.txt";

/// Shared-secret gate for the admin surface.
pub struct PasscodeGate {
    state_dir: PathBuf,
    passcode: Mutex<String>,
    events: broadcast::Sender<()>,
}

impl PasscodeGate {
    /// Load the gate from the state directory, falling back to
    /// [`DEFAULT_PASSCODE`] when nothing is persisted yet.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        let state_dir = dir.as_ref().to_path_buf();
        let passcode = fs::read_to_string(state_dir.join(PASSCODE_FILE))
            .unwrap_or_else(|_| DEFAULT_PASSCODE.to_string());

        let (events, _) = broadcast::channel(8);
        Self {
            state_dir,
            passcode: Mutex::new(passcode),
            events,
        }
    }

    /// Verbatim comparison against the stored secret.
    pub fn validate(&self, input: &str) -> bool {
        *self.current() == input
    }

    /// Replace the secret, persist it, and notify subscribers.
    ///
    /// A persistence failure is logged; the new secret still applies for the
    /// rest of the session.
    pub fn change(&self, new_passcode: impl Into<String>) {
        let new_passcode = new_passcode.into();
        {
            let mut passcode = self.current();
            *passcode = new_passcode.clone();
        }

        if let Err(e) = self.persist(&new_passcode) {
            eprintln!("PasscodeGate: failed to persist passcode: {}", e);
        }
        let _ = self.events.send(());
    }

    /// Register for change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.events.subscribe()
    }

    fn persist(&self, passcode: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.state_dir)?;
        fs::write(self.state_dir.join(PASSCODE_FILE), passcode)
    }

    fn current(&self) -> MutexGuard<'_, String> {
        self.passcode.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_passcode() {
        let dir = tempdir().unwrap();
        let gate = PasscodeGate::with_dir(dir.path());
        assert!(gate.validate("Admin"));
        assert!(!gate.validate("admin")); // verbatim, case-sensitive
        assert!(!gate.validate(""));
    }

    #[test]
    fn test_change_notifies_and_survives_reload() {
        let dir = tempdir().unwrap();
        let gate = PasscodeGate::with_dir(dir.path());
        let mut rx = gate.subscribe();

        gate.change("s3cret");
        assert!(gate.validate("s3cret"));
        assert!(!gate.validate("Admin"));
        assert!(rx.try_recv().is_ok());

        let reloaded = PasscodeGate::with_dir(dir.path());
        assert!(reloaded.validate("s3cret"));
    }
}
