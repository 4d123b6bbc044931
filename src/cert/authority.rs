//! Certificate authority for member identity certificates
//!
//! Issues Ed25519 X.509 leaf certificates binding a member public key to its
//! derived address, signed by the configured CA key. First issuance
//! registers the public key in the cache set [`REGISTERED_SET`]; reissue is
//! only granted to registered keys.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::RngCore;
use tracing::{debug, error, info, info_span, warn, Span};
use x509_cert::der::asn1::BitString;
use x509_cert::der::{Decode, Encode};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, ObjectIdentifier, SubjectPublicKeyInfoOwned};
use x509_cert::time::Validity;
use x509_cert::{Certificate, TbsCertificate, Version};

use super::address::{self, AddressEncoding};
use super::error::CertError;
use super::pem::{self, PemError, CERTIFICATE_LABEL, PRIVATE_KEY_LABEL};
use crate::cache::Cache;

/// id-Ed25519 (RFC 8410)
pub const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// Cache set holding base64 public keys that completed first issuance
pub const REGISTERED_SET: &str = "pub";

/// Length of an Ed25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Octets in a serial number (RFC 5280 upper bound)
const SERIAL_LEN: usize = 20;

/// Upper bound for X.520 organization names
const MAX_NAME_LEN: usize = 64;

/// Characters that would need escaping inside an RFC 4514 string
const RESERVED_NAME_CHARS: &[char] = &[',', '+', '=', '"', '\\', '<', '>', ';', '#'];

/// Certificate authority configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertConfig {
    /// PKCS#8 PEM file holding the CA Ed25519 key
    pub private_key_path: PathBuf,
    /// PEM file holding the CA certificate
    pub certificate_path: PathBuf,
    /// Version byte prefixed to every address payload
    pub version: u8,
    /// Lifetime of issued certificates
    pub expiration: Duration,
    pub encoding: AddressEncoding,
    pub organization: String,
    pub organizational_unit: String,
}

impl Default for CertConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from("./configs/ca_key.pem"),
            certificate_path: PathBuf::from("./configs/ca_cert.pem"),
            version: 0x01,
            expiration: Duration::from_secs(365 * 24 * 60 * 60),
            encoding: AddressEncoding::Hex,
            organization: "Cealgull".to_string(),
            organizational_unit: "Cealgull Project".to_string(),
        }
    }
}

impl CertConfig {
    /// Check every field, reporting all violations at once
    pub fn validate(&self) -> Result<(), CertError> {
        let mut errors = Vec::new();

        if self.private_key_path.as_os_str().is_empty() {
            errors.push("CA private key path must be set".to_string());
        }
        if self.certificate_path.as_os_str().is_empty() {
            errors.push("CA certificate path must be set".to_string());
        }
        if self.expiration.as_secs() == 0 {
            errors.push("certificate expiration must be at least one second".to_string());
        }
        for (field, value) in [
            ("organization", &self.organization),
            ("organizational unit", &self.organizational_unit),
        ] {
            if value.trim().is_empty() || value.trim() != value {
                errors.push(format!("{} must be non-empty without surrounding spaces", field));
            } else if value.len() > MAX_NAME_LEN {
                errors.push(format!("{} must be at most {} bytes", field, MAX_NAME_LEN));
            } else if value.contains(RESERVED_NAME_CHARS) {
                errors.push(format!("{} contains a reserved character", field));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CertError::Config(errors))
        }
    }
}

/// Issues and verifies member certificates
pub struct CertificateAuthority {
    config: CertConfig,
    signing_key: SigningKey,
    ca_cert: Certificate,
    cache: Arc<dyn Cache>,
    span: Span,
}

impl CertificateAuthority {
    /// Load the CA identity from disk.
    ///
    /// Fails if either file is unreadable or mislabelled, if either fails to
    /// parse, or if the key does not belong to the certificate.
    pub fn new(config: CertConfig, cache: Arc<dyn Cache>) -> Result<Self, CertError> {
        config.validate()?;

        let key_der = pem::load_file(&config.private_key_path, PRIVATE_KEY_LABEL)?;
        let signing_key =
            SigningKey::from_pkcs8_der(&key_der).map_err(|e| CertError::KeyParse(e.to_string()))?;

        let cert_der = pem::load_file(&config.certificate_path, CERTIFICATE_LABEL)?;
        let ca_cert =
            Certificate::from_der(&cert_der).map_err(|e| CertError::CertParse(e.to_string()))?;

        let spki = &ca_cert.tbs_certificate.subject_public_key_info;
        let verifying_key = signing_key.verifying_key();
        if spki.algorithm.oid != ED25519_OID
            || spki.subject_public_key.as_bytes() != Some(verifying_key.as_bytes().as_slice())
        {
            return Err(CertError::KeyMismatch);
        }

        let span = info_span!("cert");
        span.in_scope(|| {
            info!(
                issuer = %ca_cert.tbs_certificate.subject,
                expiration_secs = config.expiration.as_secs(),
                "Certificate authority loaded"
            );
        });

        Ok(Self {
            config,
            signing_key,
            ca_cert,
            cache,
            span,
        })
    }

    pub fn config(&self) -> &CertConfig {
        &self.config
    }

    pub fn ca_certificate(&self) -> &Certificate {
        &self.ca_cert
    }

    /// Derive the address for a raw public key under the configured version
    pub fn address(&self, pub_key: &[u8]) -> String {
        address::address(pub_key, self.config.version, self.config.encoding)
    }

    /// Issue a certificate for a first-time member and register its key.
    ///
    /// If the key cannot be registered the certificate is discarded.
    pub fn sign_csr(&self, pub_b64: &str) -> Result<String, CertError> {
        let _enter = self.span.enter();

        let pub_key = decode_pub(pub_b64)?;
        let cert = self.create_certificate(&pub_key)?;

        self.cache.sadd(REGISTERED_SET, pub_b64).map_err(|e| {
            error!(error = %e, "Failed to register public key");
            CertError::CertInternal
        })?;

        info!("Certificate signed for new member");
        Ok(cert)
    }

    /// Issue a fresh certificate for an already registered key
    pub fn resign_csr(&self, pub_b64: &str) -> Result<String, CertError> {
        let _enter = self.span.enter();

        let registered = self.cache.sismember(REGISTERED_SET, pub_b64).map_err(|e| {
            error!(error = %e, "Failed to look up registered public key");
            CertError::CertInternal
        })?;
        if !registered {
            debug!("Resign requested for unregistered key");
            return Err(CertError::PubNotFound);
        }

        let pub_key = decode_pub(pub_b64)?;
        let cert = self.create_certificate(&pub_key)?;

        info!("Certificate resigned");
        Ok(cert)
    }

    /// Check that a PEM certificate was issued by this CA
    pub fn verify_cert(&self, cert_pem: &str) -> Result<(), CertError> {
        let _enter = self.span.enter();

        let der = pem::decode(cert_pem.as_bytes(), CERTIFICATE_LABEL).map_err(|e| match e {
            PemError::Decode => CertError::CertDecode,
            PemError::Label(_) => CertError::CertFormat,
        })?;
        let cert = Certificate::from_der(&der).map_err(|_| CertError::CertFormat)?;

        if cert.signature_algorithm.oid != ED25519_OID
            || cert.tbs_certificate.signature.oid != ED25519_OID
        {
            warn!(algorithm = %cert.signature_algorithm.oid, "Unsupported signature algorithm");
            return Err(CertError::CertUnauthorized);
        }
        if cert.tbs_certificate.issuer != self.ca_cert.tbs_certificate.subject {
            warn!(issuer = %cert.tbs_certificate.issuer, "Certificate from foreign issuer");
            return Err(CertError::CertUnauthorized);
        }

        let tbs = cert
            .tbs_certificate
            .to_der()
            .map_err(|_| CertError::CertFormat)?;
        let signature = cert
            .signature
            .as_bytes()
            .and_then(|bytes| Signature::from_slice(bytes).ok())
            .ok_or(CertError::CertUnauthorized)?;

        self.signing_key
            .verifying_key()
            .verify_strict(&tbs, &signature)
            .map_err(|_| {
                warn!("Certificate signature mismatch");
                CertError::CertUnauthorized
            })
    }

    fn create_certificate(&self, pub_key: &[u8; PUBLIC_KEY_LEN]) -> Result<String, CertError> {
        let address = self.address(pub_key);
        self.build_certificate(pub_key, &address).map_err(|e| {
            error!(error = %e, "Failed to build certificate");
            CertError::CertInternal
        })
    }

    fn build_certificate(
        &self,
        pub_key: &[u8; PUBLIC_KEY_LEN],
        address: &str,
    ) -> Result<String, x509_cert::der::Error> {
        let algorithm = ed25519_algorithm();

        let subject = Name::from_str(&format!(
            "CN=0x{},OU={},O={}",
            address, self.config.organizational_unit, self.config.organization
        ))?;

        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: random_serial()?,
            signature: algorithm.clone(),
            issuer: self.ca_cert.tbs_certificate.subject.clone(),
            validity: Validity::from_now(self.config.expiration)?,
            subject,
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: algorithm.clone(),
                subject_public_key: BitString::from_bytes(pub_key)?,
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };

        let signature = self.signing_key.sign(&tbs_certificate.to_der()?);
        let cert = Certificate {
            tbs_certificate,
            signature_algorithm: algorithm,
            signature: BitString::from_bytes(&signature.to_bytes())?,
        };

        pem::encode(CERTIFICATE_LABEL, &cert.to_der()?).map_err(Into::into)
    }
}

fn ed25519_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ED25519_OID,
        parameters: None,
    }
}

/// Random positive serial of exactly [`SERIAL_LEN`] octets
fn random_serial() -> Result<SerialNumber, x509_cert::der::Error> {
    let mut bytes = [0u8; SERIAL_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & 0x7f) | 0x40;
    SerialNumber::new(&bytes)
}

fn decode_pub(pub_b64: &str) -> Result<[u8; PUBLIC_KEY_LEN], CertError> {
    let bytes = BASE64.decode(pub_b64).map_err(|_| CertError::PubDecode)?;
    bytes.try_into().map_err(|_| CertError::PubFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryCache};
    use rand::rngs::OsRng;

    fn testdata(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    fn test_config() -> CertConfig {
        CertConfig {
            private_key_path: testdata("ca_key.pem"),
            certificate_path: testdata("ca_cert.pem"),
            ..CertConfig::default()
        }
    }

    fn foreign_config() -> CertConfig {
        CertConfig {
            private_key_path: testdata("foreign_key.pem"),
            certificate_path: testdata("foreign_cert.pem"),
            ..CertConfig::default()
        }
    }

    fn authority() -> CertificateAuthority {
        CertificateAuthority::new(test_config(), Arc::new(MemoryCache::with_defaults())).unwrap()
    }

    fn random_pub() -> String {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        BASE64.encode(bytes)
    }

    fn parse(cert_pem: &str) -> Certificate {
        let der = pem::decode(cert_pem.as_bytes(), CERTIFICATE_LABEL).unwrap();
        Certificate::from_der(&der).unwrap()
    }

    /// Cache whose set operations always fail
    struct FaultyCache(MemoryCache);

    impl Cache for FaultyCache {
        fn get(&self, key: &str) -> Result<String, CacheError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
            self.0.set(key, value, ttl)
        }
        fn get_del(&self, key: &str) -> Result<String, CacheError> {
            self.0.get_del(key)
        }
        fn del(&self, key: &str) -> Result<(), CacheError> {
            self.0.del(key)
        }
        fn exists(&self, keys: &[&str]) -> Result<usize, CacheError> {
            self.0.exists(keys)
        }
        fn sadd(&self, _set: &str, _member: &str) -> Result<(), CacheError> {
            Err(CacheError::Internal("connection refused".into()))
        }
        fn sismember(&self, _set: &str, _member: &str) -> Result<bool, CacheError> {
            Err(CacheError::Internal("connection refused".into()))
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let ca = authority();
        let cert = ca.sign_csr(&random_pub()).unwrap();

        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        ca.verify_cert(&cert).unwrap();
    }

    #[test]
    fn test_issued_certificate_contents() {
        let ca = authority();
        let pub_b64 = random_pub();
        let pub_key = BASE64.decode(&pub_b64).unwrap();
        let cert = parse(&ca.sign_csr(&pub_b64).unwrap());
        let tbs = &cert.tbs_certificate;

        let subject = tbs.subject.to_string();
        assert!(subject.contains(&format!("CN=0x{}", ca.address(&pub_key))));
        assert!(subject.contains("O=Cealgull"));
        assert!(subject.contains("OU=Cealgull Project"));

        assert_eq!(tbs.issuer, ca.ca_certificate().tbs_certificate.subject);
        assert_eq!(
            tbs.subject_public_key_info.subject_public_key.as_bytes(),
            Some(pub_key.as_slice())
        );
        assert!(tbs.serial_number.as_bytes().len() <= SERIAL_LEN);

        let lifetime = tbs.validity.not_after.to_unix_duration()
            - tbs.validity.not_before.to_unix_duration();
        assert_eq!(lifetime, ca.config().expiration);
    }

    #[test]
    fn test_serials_are_unique() {
        let ca = authority();
        let pub_b64 = random_pub();
        let a = parse(&ca.sign_csr(&pub_b64).unwrap());
        let b = parse(&ca.resign_csr(&pub_b64).unwrap());
        assert_ne!(a.tbs_certificate.serial_number, b.tbs_certificate.serial_number);
    }

    #[test]
    fn test_public_key_validation() {
        let ca = authority();
        assert_eq!(ca.sign_csr("%%%"), Err(CertError::PubDecode));
        assert_eq!(ca.sign_csr(&BASE64.encode([1u8, 2])), Err(CertError::PubFormat));
    }

    #[test]
    fn test_resign_requires_registration() {
        let ca = authority();
        let pub_b64 = random_pub();

        assert_eq!(ca.resign_csr(&pub_b64), Err(CertError::PubNotFound));
        ca.sign_csr(&pub_b64).unwrap();
        let cert = ca.resign_csr(&pub_b64).unwrap();
        ca.verify_cert(&cert).unwrap();
    }

    #[test]
    fn test_rejected_key_is_not_registered() {
        let ca = authority();
        let short = BASE64.encode([7u8; 16]);
        assert_eq!(ca.sign_csr(&short), Err(CertError::PubFormat));
        assert_eq!(ca.resign_csr(&short), Err(CertError::PubNotFound));
    }

    #[test]
    fn test_cache_failures_are_internal() {
        let ca = CertificateAuthority::new(
            test_config(),
            Arc::new(FaultyCache(MemoryCache::with_defaults())),
        )
        .unwrap();

        assert_eq!(ca.sign_csr(&random_pub()), Err(CertError::CertInternal));
        assert_eq!(ca.resign_csr(&random_pub()), Err(CertError::CertInternal));
    }

    #[test]
    fn test_foreign_certificate_unauthorized() {
        let ours = authority();
        let theirs =
            CertificateAuthority::new(foreign_config(), Arc::new(MemoryCache::with_defaults()))
                .unwrap();

        let cert = theirs.sign_csr(&random_pub()).unwrap();
        theirs.verify_cert(&cert).unwrap();
        assert_eq!(ours.verify_cert(&cert), Err(CertError::CertUnauthorized));
    }

    #[test]
    fn test_tampered_signature_unauthorized() {
        let ca = authority();
        let mut cert = parse(&ca.sign_csr(&random_pub()).unwrap());

        let mut sig = cert.signature.raw_bytes().to_vec();
        sig[0] ^= 0x01;
        cert.signature = BitString::from_bytes(&sig).unwrap();

        let tampered = pem::encode(CERTIFICATE_LABEL, &cert.to_der().unwrap()).unwrap();
        assert_eq!(ca.verify_cert(&tampered), Err(CertError::CertUnauthorized));
    }

    #[test]
    fn test_verify_rejects_malformed_input() {
        let ca = authority();
        let read = |name: &str| std::fs::read_to_string(testdata(name)).unwrap();

        assert_eq!(ca.verify_cert("garbage"), Err(CertError::CertDecode));
        assert_eq!(ca.verify_cert(&read("pem_invalid.pem")), Err(CertError::CertDecode));
        assert_eq!(ca.verify_cert(&read("ca_key.pem")), Err(CertError::CertFormat));
        assert_eq!(ca.verify_cert(&read("cert_invalid.pem")), Err(CertError::CertFormat));
    }

    #[test]
    fn test_ca_certificate_verifies_itself() {
        // The CA certificate is self-signed by the same key
        let ca = authority();
        ca.verify_cert(&std::fs::read_to_string(testdata("ca_cert.pem")).unwrap())
            .unwrap();
    }

    #[test]
    fn test_load_errors() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::with_defaults());
        let load = |config: CertConfig| CertificateAuthority::new(config, cache.clone()).err();

        assert!(matches!(
            load(CertConfig {
                private_key_path: testdata("absent.pem"),
                ..test_config()
            }),
            Some(CertError::FileRead { .. })
        ));
        assert!(matches!(
            load(CertConfig {
                certificate_path: testdata("pem_invalid.pem"),
                ..test_config()
            }),
            Some(CertError::PemDecode { .. })
        ));
        assert!(matches!(
            load(CertConfig {
                private_key_path: testdata("ca_cert.pem"),
                ..test_config()
            }),
            Some(CertError::PemLabel { .. })
        ));
        assert!(matches!(
            load(CertConfig {
                private_key_path: testdata("key_invalid.pem"),
                ..test_config()
            }),
            Some(CertError::KeyParse(_))
        ));
        assert!(matches!(
            load(CertConfig {
                certificate_path: testdata("cert_invalid.pem"),
                ..test_config()
            }),
            Some(CertError::CertParse(_))
        ));
        assert!(matches!(
            load(CertConfig {
                private_key_path: testdata("foreign_key.pem"),
                ..test_config()
            }),
            Some(CertError::KeyMismatch)
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(CertConfig::default().validate().is_ok());

        let err = CertConfig {
            expiration: Duration::ZERO,
            organization: "Evil, Inc".into(),
            organizational_unit: "".into(),
            ..CertConfig::default()
        }
        .validate()
        .unwrap_err();
        match err {
            CertError::Config(problems) => assert_eq!(problems.len(), 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_base58_addresses() {
        let ca = CertificateAuthority::new(
            CertConfig {
                encoding: AddressEncoding::Base58,
                ..test_config()
            },
            Arc::new(MemoryCache::with_defaults()),
        )
        .unwrap();

        let pub_b64 = random_pub();
        let pub_key = BASE64.decode(&pub_b64).unwrap();
        let cert = parse(&ca.sign_csr(&pub_b64).unwrap());
        assert!(cert
            .tbs_certificate
            .subject
            .to_string()
            .contains(&format!("CN=0x{}", ca.address(&pub_key))));
        assert!(address::is_valid(&ca.address(&pub_key), AddressEncoding::Base58));
    }
}
