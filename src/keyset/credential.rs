//! One-time ring credentials handed to verified members
//!
//! Wire format (JSON):
//!
//! ```json
//! {"pubs": ["<b64 point>", ...], "priv": "<b64 scalar>", "idx": 3}
//! ```

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use super::error::RingError;
use super::ring::{decode_point, decode_scalar, RingScheme, SagRing};

/// Snapshot of the anonymity set plus one member secret
pub struct RingCredential<S: RingScheme = SagRing> {
    pubs: Vec<S::PublicKey>,
    secret: S::SecretKey,
    index: usize,
}

impl<S: RingScheme> RingCredential<S> {
    pub fn new(pubs: Vec<S::PublicKey>, secret: S::SecretKey, index: usize) -> Self {
        Self {
            pubs,
            secret,
            index,
        }
    }

    /// Public keys of the set this credential was drawn from, in ring order
    pub fn pubs(&self) -> &[S::PublicKey] {
        &self.pubs
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn ring_size(&self) -> usize {
        self.pubs.len()
    }

    /// Sign `message` with an explicit scheme instance
    pub fn sign_with(&self, scheme: &S, message: &[u8]) -> Result<String, RingError> {
        let signature = scheme.sign(message, &self.pubs, &self.secret, self.index)?;
        Ok(BASE64.encode(scheme.encode_signature(&signature)))
    }
}

impl<S: RingScheme + Default> RingCredential<S> {
    /// Produce the base64 signature accepted by `KeysetManager::verify`
    pub fn sign(&self, message: &[u8]) -> Result<String, RingError> {
        self.sign_with(&S::default(), message)
    }
}

impl<S: RingScheme> Drop for RingCredential<S> {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl<S: RingScheme> fmt::Debug for RingCredential<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingCredential")
            .field("ring_size", &self.pubs.len())
            .field("index", &self.index)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct CredentialWire {
    pubs: Vec<String>,
    #[serde(rename = "priv")]
    secret: String,
    idx: usize,
}

impl Serialize for RingCredential<SagRing> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut wire = CredentialWire {
            pubs: self
                .pubs
                .iter()
                .map(|p| BASE64.encode(p.compress().as_bytes()))
                .collect(),
            secret: BASE64.encode(self.secret.as_bytes()),
            idx: self.index,
        };
        let result = wire.serialize(serializer);
        wire.secret.zeroize();
        result
    }
}

impl<'de> Deserialize<'de> for RingCredential<SagRing> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut wire = CredentialWire::deserialize(deserializer)?;

        let pubs = wire
            .pubs
            .iter()
            .map(|p| {
                let bytes = BASE64.decode(p).map_err(D::Error::custom)?;
                decode_point(&bytes).map_err(D::Error::custom)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut secret_bytes = BASE64.decode(&wire.secret).map_err(D::Error::custom)?;
        wire.secret.zeroize();
        let secret = decode_scalar(&secret_bytes);
        secret_bytes.zeroize();
        let secret = secret.map_err(D::Error::custom)?;

        if wire.idx >= pubs.len() {
            return Err(D::Error::custom(RingError::IndexOutOfRange {
                index: wire.idx,
                size: pubs.len(),
            }));
        }

        Ok(Self::new(pubs, secret, wire.idx))
    }
}
