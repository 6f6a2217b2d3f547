use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

/// Site-level access switch. Polling only runs while the gate is unlocked.
pub trait AccessGate: Send + Sync + 'static {
    fn is_unlocked(&self) -> bool;
}

/// A gate that is always open.
pub struct Open;

impl AccessGate for Open {
    fn is_unlocked(&self) -> bool {
        true
    }
}

/// Password gate comparing the SHA-256 of the entered password with a stored
/// hex digest.
pub struct PasswordGate {
    expected_hex: String,
    unlocked: AtomicBool,
}

impl PasswordGate {
    pub fn new(expected_hex: impl Into<String>) -> Self {
        Self {
            expected_hex: expected_hex.into().trim().to_ascii_lowercase(),
            unlocked: AtomicBool::new(false),
        }
    }

    pub fn from_password(password: &str) -> Self {
        Self::new(hash_password(password))
    }

    /// Returns whether the password matched. A wrong password locks the gate.
    pub fn unlock(&self, password: &str) -> bool {
        let ok = hash_password(password) == self.expected_hex;
        self.unlocked.store(ok, Ordering::Release);
        ok
    }

    pub fn lock(&self) {
        self.unlocked.store(false, Ordering::Release);
    }
}

impl AccessGate for PasswordGate {
    fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::Acquire)
    }
}

pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}
