//! Rotating anonymity set manager
//!
//! Owns the live anonymity set and the verification counter behind one mutex.
//! `dispatch` snapshots the set for a new member; `verify` checks a ring
//! signature against the live set and rotates it once `capacity`
//! verifications have been spent on it.

use std::sync::{Mutex, MutexGuard};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use tracing::{debug, info, info_span, warn, Span};
use zeroize::Zeroize;

use super::credential::RingCredential;
use super::error::KeysetError;
use super::ring::{RingScheme, SagRing};

/// Keyset manager configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysetConfig {
    /// Number of key pairs in every anonymity set
    pub anonymity_set_size: usize,
    /// Verifications allowed against one set before it is rotated
    pub capacity: u64,
}

impl Default for KeysetConfig {
    fn default() -> Self {
        Self {
            anonymity_set_size: 16,
            capacity: 1024,
        }
    }
}

impl KeysetConfig {
    /// Check every field, reporting all violations at once
    pub fn validate(&self) -> Result<(), KeysetError> {
        let mut errors = Vec::new();
        if self.anonymity_set_size == 0 {
            errors.push("anonymity set size must be at least 1".to_string());
        }
        if self.capacity == 0 {
            errors.push("keyset capacity must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(KeysetError::Config(errors))
        }
    }
}

/// N key pairs, public and secret halves at matching indices
struct AnonymitySet<S: RingScheme> {
    public: Vec<S::PublicKey>,
    secret: Vec<S::SecretKey>,
}

impl<S: RingScheme> AnonymitySet<S> {
    fn generate(scheme: &S, size: usize) -> Self {
        let (secret, public): (Vec<S::SecretKey>, Vec<S::PublicKey>) =
            (0..size).map(|_| scheme.generate_keypair()).unzip();
        Self { public, secret }
    }
}

impl<S: RingScheme> Drop for AnonymitySet<S> {
    fn drop(&mut self) {
        for secret in &mut self.secret {
            secret.zeroize();
        }
    }
}

struct KeysetState<S: RingScheme> {
    set: AnonymitySet<S>,
    /// Verifications since the last rotation
    count: u64,
    /// Number of rotations since startup
    generation: u64,
}

/// Dispatches one-time ring credentials and verifies ring signatures
pub struct KeysetManager<S: RingScheme = SagRing> {
    scheme: S,
    config: KeysetConfig,
    state: Mutex<KeysetState<S>>,
    span: Span,
}

impl KeysetManager<SagRing> {
    /// Create a manager backed by SAG signatures over Ristretto
    pub fn new(config: KeysetConfig) -> Result<Self, KeysetError> {
        Self::with_scheme(SagRing, config)
    }
}

impl<S: RingScheme> KeysetManager<S> {
    pub fn with_scheme(scheme: S, config: KeysetConfig) -> Result<Self, KeysetError> {
        config.validate()?;

        let span = info_span!("keyset");
        let set = AnonymitySet::generate(&scheme, config.anonymity_set_size);

        span.in_scope(|| {
            info!(
                anonymity_set_size = config.anonymity_set_size,
                capacity = config.capacity,
                "Keyset manager initialized"
            );
        });

        Ok(Self {
            scheme,
            config,
            state: Mutex::new(KeysetState {
                set,
                count: 0,
                generation: 0,
            }),
            span,
        })
    }

    // The set is swapped in one assignment, so a poisoned guard still holds
    // a consistent state.
    fn lock(&self) -> MutexGuard<'_, KeysetState<S>> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Keyset lock poisoned, recovering state");
            poisoned.into_inner()
        })
    }

    /// Hand out a credential for a uniformly random member of the live set
    pub fn dispatch(&self) -> RingCredential<S> {
        let _enter = self.span.enter();
        let state = self.lock();

        let index = rand::thread_rng().gen_range(0..state.set.public.len());
        let credential = RingCredential::new(
            state.set.public.clone(),
            state.set.secret[index].clone(),
            index,
        );

        debug!(generation = state.generation, "Credential dispatched");
        credential
    }

    /// Verify a base64 ring signature over `message` against the live set.
    ///
    /// Undecodable signatures are rejected before the lock is taken and do not
    /// count towards the capacity.
    pub fn verify(&self, message: &[u8], signature: &str) -> Result<(), KeysetError> {
        let _enter = self.span.enter();

        let signature = BASE64
            .decode(signature)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                self.scheme
                    .decode_signature(&bytes, self.config.anonymity_set_size)
                    .map_err(|e| e.to_string())
            })
            .map_err(|e| {
                warn!(error = %e, "Rejected undecodable signature");
                KeysetError::SignatureDecode
            })?;

        let verified = {
            let mut state = self.lock();
            let verified = self.scheme.verify(message, &state.set.public, &signature);
            state.count += 1;
            if state.count >= self.config.capacity {
                self.renew_keyset(&mut state);
            }
            verified
        };

        if verified {
            debug!("Ring signature verified");
            Ok(())
        } else {
            debug!("Ring signature rejected");
            Err(KeysetError::SignatureVerification)
        }
    }

    /// Replace the live set. Caller holds the lock.
    fn renew_keyset(&self, state: &mut KeysetState<S>) {
        state.set = AnonymitySet::generate(&self.scheme, self.config.anonymity_set_size);
        state.count = 0;
        state.generation += 1;
        info!(generation = state.generation, "Anonymity set rotated");
    }

    /// Verifications spent on the live set
    pub fn verifications(&self) -> u64 {
        self.lock().count
    }

    /// Rotations since startup
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn anonymity_set_size(&self) -> usize {
        self.config.anonymity_set_size
    }

    pub fn capacity(&self) -> u64 {
        self.config.capacity
    }

    pub fn config(&self) -> &KeysetConfig {
        &self.config
    }
}
