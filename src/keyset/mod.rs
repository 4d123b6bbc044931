//! Anonymous ring credentials
//!
//! A verified member receives a [`RingCredential`]: a copy of the current
//! anonymity set plus one of its secrets. Signing with it proves membership in
//! the set without revealing which member signed. The [`KeysetManager`]
//! rotates the set after a fixed number of verifications, which invalidates
//! every credential drawn from the old set.

pub mod credential;
pub mod error;
pub mod manager;
pub mod ring;

pub use credential::RingCredential;
pub use error::{KeysetError, RingError};
pub use manager::{KeysetConfig, KeysetManager};
pub use ring::{RingScheme, SagRing, SagSignature};
