//! X.509 certificate authority
//!
//! Members submit an Ed25519 public key and receive a certificate whose subject
//! common name is `0x<address>`, the address being a checksummed encoding of
//! the key (see [`address`]).

pub mod address;
pub mod authority;
pub mod error;
pub mod pem;

pub use address::AddressEncoding;
pub use authority::{CertConfig, CertificateAuthority, REGISTERED_SET};
pub use error::CertError;
