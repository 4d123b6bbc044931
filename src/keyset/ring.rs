//! Ring-signature primitives.
//!
//! [`RingScheme`] is the capability the keyset manager depends on: sign over an
//! ordered public-key sequence with one member's secret, and verify a proof
//! against that sequence without learning which member produced it.
//!
//! # SAG over Ristretto
//!
//! [`SagRing`] is a spontaneous anonymous group signature (Abe–Ohkubo–Suzuki
//! Schnorr ring) over the Ristretto group:
//!
//! - every challenge is `H(tag || ring || message || commitment)` with SHA-512
//!   reduced to a scalar, so a proof is bound to the exact ring it was made for
//! - a signature is `(c_0, s_0 .. s_{n-1})`, `32 * (n + 1)` bytes
//! - verification walks the whole ring once from `c_0` and accepts when the
//!   chain closes; the amount of work does not depend on the signer index
//!
//! There is no key image, so two signatures by the same member are unlinkable.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use super::error::RingError;

/// Domain separation tag mixed into every challenge hash
pub const SAG_DOMAIN_TAG: &[u8] = b"cealgull-verify/sag-ristretto/v1";

/// Encoded length of a scalar
pub const SCALAR_LEN: usize = 32;

/// Encoded length of a compressed Ristretto point
pub const POINT_LEN: usize = 32;

/// A pluggable ring-signature scheme.
pub trait RingScheme: Send + Sync + 'static {
    type PublicKey: Clone + Send + Sync;
    type SecretKey: Clone + Send + Sync + Zeroize;
    type Signature: Send;

    /// Generate a fresh member key pair
    fn generate_keypair(&self) -> (Self::SecretKey, Self::PublicKey);

    /// Sign `message` as member `index` of `ring`
    fn sign(
        &self,
        message: &[u8],
        ring: &[Self::PublicKey],
        secret: &Self::SecretKey,
        index: usize,
    ) -> Result<Self::Signature, RingError>;

    /// Check that `signature` was produced by *some* member of `ring`
    fn verify(&self, message: &[u8], ring: &[Self::PublicKey], signature: &Self::Signature)
        -> bool;

    fn encode_signature(&self, signature: &Self::Signature) -> Vec<u8>;

    /// Decode a signature made over a ring of `ring_size` members
    fn decode_signature(&self, bytes: &[u8], ring_size: usize)
        -> Result<Self::Signature, RingError>;
}

/// SAG ring signatures over Ristretto
#[derive(Debug, Clone, Copy, Default)]
pub struct SagRing;

/// A SAG proof: the starting challenge and one response per ring member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagSignature {
    challenge: Scalar,
    responses: Vec<Scalar>,
}

impl SagSignature {
    /// Number of ring members this proof covers
    pub fn ring_size(&self) -> usize {
        self.responses.len()
    }
}

impl SagRing {
    /// Hash state absorbing everything except the per-member commitment
    fn transcript(message: &[u8], ring: &[RistrettoPoint]) -> Sha512 {
        let mut hasher = Sha512::new();
        hasher.update(SAG_DOMAIN_TAG);
        hasher.update((ring.len() as u64).to_le_bytes());
        for member in ring {
            hasher.update(member.compress().as_bytes());
        }
        hasher.update((message.len() as u64).to_le_bytes());
        hasher.update(message);
        hasher
    }

    fn challenge(transcript: &Sha512, commitment: &RistrettoPoint) -> Scalar {
        let mut hasher = transcript.clone();
        hasher.update(commitment.compress().as_bytes());
        Scalar::from_hash(hasher)
    }
}

impl RingScheme for SagRing {
    type PublicKey = RistrettoPoint;
    type SecretKey = Scalar;
    type Signature = SagSignature;

    fn generate_keypair(&self) -> (Scalar, RistrettoPoint) {
        let secret = Scalar::random(&mut OsRng);
        let public = RistrettoPoint::mul_base(&secret);
        (secret, public)
    }

    fn sign(
        &self,
        message: &[u8],
        ring: &[RistrettoPoint],
        secret: &Scalar,
        index: usize,
    ) -> Result<SagSignature, RingError> {
        let n = ring.len();
        if n == 0 {
            return Err(RingError::EmptyRing);
        }
        if index >= n {
            return Err(RingError::IndexOutOfRange { index, size: n });
        }
        if ring[index] != RistrettoPoint::mul_base(secret) {
            return Err(RingError::KeyMismatch(index));
        }

        let transcript = Self::transcript(message, ring);
        let mut challenges = vec![Scalar::ZERO; n];
        let mut responses = vec![Scalar::ZERO; n];

        let mut alpha = Scalar::random(&mut OsRng);
        challenges[(index + 1) % n] =
            Self::challenge(&transcript, &RistrettoPoint::mul_base(&alpha));

        // Close the ring from the signer's successor back round to the signer.
        let mut i = (index + 1) % n;
        while i != index {
            responses[i] = Scalar::random(&mut OsRng);
            let commitment = RistrettoPoint::vartime_double_scalar_mul_basepoint(
                &challenges[i],
                &ring[i],
                &responses[i],
            );
            challenges[(i + 1) % n] = Self::challenge(&transcript, &commitment);
            i = (i + 1) % n;
        }

        responses[index] = alpha - challenges[index] * secret;
        alpha.zeroize();

        Ok(SagSignature {
            challenge: challenges[0],
            responses,
        })
    }

    fn verify(&self, message: &[u8], ring: &[RistrettoPoint], signature: &SagSignature) -> bool {
        if ring.is_empty() || signature.responses.len() != ring.len() {
            return false;
        }

        let transcript = Self::transcript(message, ring);
        let mut challenge = signature.challenge;
        for (member, response) in ring.iter().zip(&signature.responses) {
            let commitment =
                RistrettoPoint::vartime_double_scalar_mul_basepoint(&challenge, member, response);
            challenge = Self::challenge(&transcript, &commitment);
        }

        challenge == signature.challenge
    }

    fn encode_signature(&self, signature: &SagSignature) -> Vec<u8> {
        let mut out = Vec::with_capacity(SCALAR_LEN * (signature.responses.len() + 1));
        out.extend_from_slice(signature.challenge.as_bytes());
        for response in &signature.responses {
            out.extend_from_slice(response.as_bytes());
        }
        out
    }

    fn decode_signature(&self, bytes: &[u8], ring_size: usize) -> Result<SagSignature, RingError> {
        let expected = SCALAR_LEN * (ring_size + 1);
        if ring_size == 0 || bytes.len() != expected {
            return Err(RingError::Malformed(format!(
                "expected {} signature bytes, got {}",
                expected,
                bytes.len()
            )));
        }

        let mut scalars = bytes
            .chunks_exact(SCALAR_LEN)
            .map(decode_scalar)
            .collect::<Result<Vec<_>, _>>()?;
        let challenge = scalars.remove(0);

        Ok(SagSignature {
            challenge,
            responses: scalars,
        })
    }
}

/// Decode a canonical little-endian scalar
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, RingError> {
    let bytes: [u8; SCALAR_LEN] = bytes
        .try_into()
        .map_err(|_| RingError::Malformed(format!("scalar must be {} bytes", SCALAR_LEN)))?;
    Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
        .ok_or_else(|| RingError::Malformed("non-canonical scalar".into()))
}

/// Decode a compressed Ristretto point
pub fn decode_point(bytes: &[u8]) -> Result<RistrettoPoint, RingError> {
    CompressedRistretto::from_slice(bytes)
        .map_err(|_| RingError::Malformed(format!("point must be {} bytes", POINT_LEN)))?
        .decompress()
        .ok_or_else(|| RingError::Malformed("invalid Ristretto point".into()))
}
