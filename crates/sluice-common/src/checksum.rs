//! Checksum utilities for payload verification
//!
//! Digests are lowercase hex SHA-256, the same form written to `.sha256` sidecar files.

use crate::error::{Result, SluiceError};
use sha2::{Digest, Sha256};

/// File suffix of the sidecar holding a payload digest
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Compute the lowercase hex SHA-256 of bytes
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that data matches the expected digest
///
/// Comparison is exact: the sidecar format is lowercase hex and anything else
/// is treated as a mismatch.
pub fn verify_checksum(data: &[u8], expected: &str) -> Result<()> {
    let actual = sha256_hex(data);
    if actual == expected {
        Ok(())
    } else {
        Err(SluiceError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// Name of the sidecar file for a payload file name
pub fn checksum_file_name(file_name: &str) -> String {
    format!("{file_name}{CHECKSUM_SUFFIX}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_verify_checksum_match() {
        let expected = sha256_hex("fødselsnummer,fom,tom,grad\n".as_bytes());
        assert!(verify_checksum("fødselsnummer,fom,tom,grad\n".as_bytes(), &expected).is_ok());
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let expected = sha256_hex(b"original");
        let err = verify_checksum(b"tampered", &expected).unwrap_err();
        let SluiceError::ChecksumMismatch { expected: e, actual } = err;
        assert_eq!(e, expected);
        assert_ne!(actual, expected);
    }

    #[test]
    fn test_uppercase_digest_is_a_mismatch() {
        let expected = sha256_hex(b"data").to_uppercase();
        assert!(verify_checksum(b"data", &expected).is_err());
    }

    #[test]
    fn test_checksum_file_name() {
        assert_eq!(checksum_file_name("a.csv"), "a.csv.sha256");
    }
}
