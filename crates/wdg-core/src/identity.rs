//! # Identity Newtypes
//!
//! Newtype wrappers for every identifier in the dispute-game engine.
//! These prevent accidental identifier confusion: you cannot pass a
//! `GameId` where a `RequestId` is expected.
//!
//! Accounts are UUID-backed. Handles (`GameId`, `VaultId`, `RequestId`) are
//! dense `u64` indexes handed out by their owning registry.
//!
//! ## Derived accounts
//!
//! Engine-owned accounts (game custody, vaults, the resolver) have no key
//! holder. They are derived deterministically from a namespace and an index
//! via SHA-256, so two engines built from the same configuration agree on
//! every address.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An identity able to hold value on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a new random account identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The null identity. Rejected wherever a real party is required.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this is the null identity.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Derive a deterministic identity from a namespace and an index.
    ///
    /// The first 16 bytes of `sha256(namespace || 0x00 || index_be)`.
    pub fn derive(namespace: &str, index: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(index.to_be_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(Uuid::from_bytes(bytes))
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

/// Handle of a dispute game inside the factory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameId(pub u64);

/// Handle of an escrow vault inside the factory arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VaultId(pub u64);

/// Identifier of a withdrawal request registered with the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl GameId {
    /// Position in the factory's game arena, if addressable on this target.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl VaultId {
    /// Position in the factory's vault arena, if addressable on this target.
    pub fn index(&self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "game:{}", self.0)
    }
}

impl std::fmt::Display for VaultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vault:{}", self.0)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request:{}", self.0)
    }
}
