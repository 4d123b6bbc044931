//! Configuration for the verification service
//!
//! CLI arguments and environment variable handling using clap. A `.env` file
//! is loaded by the binary before parsing.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::cache::CacheConfig;
use crate::cert::{AddressEncoding, CertConfig, CertError};
use crate::keyset::{KeysetConfig, KeysetError};
use crate::passcode::{PasscodeConfig, PasscodeError};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Cealgull Verify - anonymous credentials and member certificates
#[derive(Parser, Debug, Clone)]
#[command(name = "cealgull-verify")]
#[command(about = "Anonymous ring credentials and X.509 certificates for Cealgull members")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Enable development mode (passcodes are written to the log in full)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Interval between purges of expired cache entries, in seconds
    #[arg(long, env = "CACHE_CLEANUP_SECS", default_value = "60")]
    pub cache_cleanup_secs: u64,

    /// Anonymity set configuration
    #[command(flatten)]
    pub keyset: KeysetArgs,

    /// Certificate authority configuration
    #[command(flatten)]
    pub cert: CertArgs,

    /// Passcode configuration
    #[command(flatten)]
    pub passcode: PasscodeArgs,
}

/// Anonymity set configuration
#[derive(Parser, Debug, Clone)]
pub struct KeysetArgs {
    /// Number of members in each anonymity set
    #[arg(long, env = "KEYSET_NR_MEM", default_value = "16")]
    pub anonymity_set_size: usize,

    /// Verifications allowed before the set is rotated
    #[arg(long = "keyset-capacity", env = "KEYSET_CAP", default_value = "1024")]
    pub capacity: u64,
}

/// Certificate authority configuration
#[derive(Parser, Debug, Clone)]
pub struct CertArgs {
    /// CA Ed25519 private key (PKCS#8 PEM)
    #[arg(long, env = "CA_PRIVATE_KEY", default_value = "./configs/ca_key.pem")]
    pub ca_private_key: PathBuf,

    /// CA certificate (PEM)
    #[arg(long, env = "CA_CERTIFICATE", default_value = "./configs/ca_cert.pem")]
    pub ca_certificate: PathBuf,

    /// Version byte prefixed to member addresses
    #[arg(long, env = "ADDRESS_VERSION", default_value = "1")]
    pub address_version: u8,

    /// Text encoding for member addresses
    #[arg(long, env = "ADDRESS_ENCODING", value_enum, default_value = "hex")]
    pub address_encoding: AddressEncoding,

    /// Lifetime of issued certificates in seconds
    #[arg(long, env = "CERT_EXPIRATION_SECS", default_value = "31536000")]
    pub cert_expiration_secs: u64,

    /// Organization (O) of issued certificates
    #[arg(long, env = "CERT_ORGANIZATION", default_value = "Cealgull")]
    pub cert_organization: String,

    /// Organizational unit (OU) of issued certificates
    #[arg(long, env = "CERT_ORGANIZATIONAL_UNIT", default_value = "Cealgull Project")]
    pub cert_organizational_unit: String,
}

/// Passcode configuration
#[derive(Parser, Debug, Clone)]
pub struct PasscodeArgs {
    /// Passcode lifetime in seconds
    #[arg(long, env = "PASSCODE_TTL_SECS", default_value = "300")]
    pub passcode_ttl_secs: u64,

    /// Mail domain appended to member accounts
    #[arg(long, env = "ACCOUNT_DOMAIN", default_value = "example.edu")]
    pub account_domain: String,
}

impl Args {
    pub fn keyset_config(&self) -> KeysetConfig {
        KeysetConfig {
            anonymity_set_size: self.keyset.anonymity_set_size,
            capacity: self.keyset.capacity,
        }
    }

    pub fn cert_config(&self) -> CertConfig {
        CertConfig {
            private_key_path: self.cert.ca_private_key.clone(),
            certificate_path: self.cert.ca_certificate.clone(),
            version: self.cert.address_version,
            expiration: Duration::from_secs(self.cert.cert_expiration_secs),
            encoding: self.cert.address_encoding,
            organization: self.cert.cert_organization.clone(),
            organizational_unit: self.cert.cert_organizational_unit.clone(),
        }
    }

    pub fn passcode_config(&self) -> PasscodeConfig {
        PasscodeConfig {
            ttl: Duration::from_secs(self.passcode.passcode_ttl_secs),
            domain: self.passcode.account_domain.clone(),
            ..PasscodeConfig::default()
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            cleanup_interval: Duration::from_secs(self.cache_cleanup_secs),
        }
    }

    /// Validate configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "LOG_LEVEL must be one of {}, got {:?}",
                LOG_LEVELS.join(", "),
                self.log_level
            ));
        }
        if self.cache_cleanup_secs == 0 {
            errors.push("CACHE_CLEANUP_SECS must be at least 1".to_string());
        }

        if let Err(KeysetError::Config(problems)) = self.keyset_config().validate() {
            errors.extend(problems);
        }
        if let Err(CertError::Config(problems)) = self.cert_config().validate() {
            errors.extend(problems);
        }
        if let Err(PasscodeError::Config(problems)) = self.passcode_config().validate() {
            errors.extend(problems);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
