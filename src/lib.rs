//! Cealgull Verify - anonymous membership credentials and certificates
//!
//! A member proves control of an email account with a one-time passcode and
//! receives a ring credential drawn from a rotating anonymity set. With it the
//! member anonymously signs the public key it wants certified, and the
//! certificate authority issues an X.509 certificate binding that key to a
//! deterministic address.
//!
//! ## Components
//!
//! - **Keyset**: rotating anonymity set, credential dispatch and ring signature verification
//! - **Cert**: Ed25519 certificate authority with registration-gated reissue
//! - **Passcode**: single-use email passcodes
//! - **Cache**: key/value + set store shared by the CA and passcode manager
//! - **Server**: hyper HTTP front end

pub mod cache;
pub mod cert;
pub mod config;
pub mod keyset;
pub mod passcode;
pub mod routes;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, VerifyError};
