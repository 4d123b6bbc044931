//! PEM helpers for keys and certificates

use std::path::Path;

use x509_cert::der::pem::{self, LineEnding};

use super::error::CertError;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Why a PEM document was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PemError {
    /// Not a PEM document at all
    Decode,
    /// Well-formed PEM with a different label
    Label(String),
}

/// Decode a PEM document, requiring the given label
pub fn decode(data: &[u8], label: &str) -> Result<Vec<u8>, PemError> {
    let (found, der) = pem::decode_vec(data).map_err(|_| PemError::Decode)?;
    if found != label {
        return Err(PemError::Label(found.to_string()));
    }
    Ok(der)
}

pub fn encode(label: &str, der: &[u8]) -> Result<String, pem::Error> {
    pem::encode_string(label, LineEnding::LF, der)
}

/// Read a PEM file from disk and return its DER payload
pub fn load_file(path: &Path, label: &str) -> Result<Vec<u8>, CertError> {
    let display = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| CertError::FileRead {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    decode(&data, label).map_err(|e| match e {
        PemError::Decode => CertError::PemDecode { path: display },
        PemError::Label(found) => CertError::PemLabel {
            path: display,
            expected: label.to_string(),
            found,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn testdata(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    #[test]
    fn test_encode_decode() {
        let pem = encode(CERTIFICATE_LABEL, b"payload").unwrap();
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert_eq!(decode(pem.as_bytes(), CERTIFICATE_LABEL).unwrap(), b"payload");
        assert_eq!(
            decode(pem.as_bytes(), PRIVATE_KEY_LABEL),
            Err(PemError::Label("CERTIFICATE".into()))
        );
        assert_eq!(decode(b"not pem", CERTIFICATE_LABEL), Err(PemError::Decode));
    }

    #[test]
    fn test_load_file_errors() {
        assert!(matches!(
            load_file(&testdata("missing.pem"), CERTIFICATE_LABEL),
            Err(CertError::FileRead { .. })
        ));
        assert!(matches!(
            load_file(&testdata("pem_invalid.pem"), CERTIFICATE_LABEL),
            Err(CertError::PemDecode { .. })
        ));
        assert!(matches!(
            load_file(&testdata("ca_key.pem"), CERTIFICATE_LABEL),
            Err(CertError::PemLabel { .. })
        ));
        assert!(load_file(&testdata("ca_cert.pem"), CERTIFICATE_LABEL).is_ok());
    }
}
