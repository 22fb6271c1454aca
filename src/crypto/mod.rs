//! Cryptographic primitives for repokey.
//!
//! This module provides:
//! - AES-256-GCM key wrapping (`encryption`)
//! - Argon2id + HKDF passphrase derivation (`kdf`)
//! - Secret key newtypes (`keys`)
//! - X25519 sealed-box wrapping and local identities (`envelope`)
//! - The `Primitives` trait the orchestrator is written against (`provider`)

pub mod encryption;
pub mod envelope;
pub mod kdf;
pub mod keys;
pub mod provider;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{MasterKey, Primitives, DefaultPrimitives, ...};
pub use envelope::Identity;
pub use kdf::Argon2Params;
pub use keys::{ConfirmationHash, MasterKey, WrappingKey};
pub use provider::{DefaultPrimitives, Primitives};
