//! Certificate comparison that survives re-encoding.
//!
//! A certificate is "bounced" by decoding it and encoding it again. Two blobs
//! are an effective match when they are byte-identical or when they bounce to
//! the same certificate.

use der::{Decode, Encode};
use thiserror::Error;

pub use x509_cert::Certificate;

pub mod canonical;

/// The largest difference in size allowed between a blob and its bounced
/// form. Anything bigger means the blob held more (or less) than a single
/// certificate.
pub const MAX_LENGTH_DRIFT: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("empty certificate")]
    Empty,

    #[error("truncated encoding at offset {0}")]
    Truncated(usize),

    #[error("indefinite length at offset {0}")]
    IndefiniteLength(usize),

    #[error("length overflow at offset {0}")]
    LengthOverflow(usize),

    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error("x509 decoding failed: {0}")]
    Decode(#[from] der::Error),

    #[error("bounced cert length looks fishy; before {before}, after {after}")]
    LengthDrift { before: usize, after: usize },
}

/// Decode the first certificate in `input` and check that re-encoding it
/// doesn't change the size by more than [MAX_LENGTH_DRIFT].
pub fn bounce(input: &[u8]) -> Result<Certificate, CertificateError> {
    if input.is_empty() {
        return Err(CertificateError::Empty);
    }

    let (canonical, _) = canonical::canonicalize_first(input)?;
    let cert = Certificate::from_der(&canonical)?;
    let encoded = cert.to_der()?;

    if encoded.len().abs_diff(input.len()) > MAX_LENGTH_DRIFT {
        return Err(CertificateError::LengthDrift {
            before: input.len(),
            after: encoded.len(),
        });
    }

    Ok(cert)
}

/// True when `a` and `b` are the same bytes or decode to the same
/// certificate.
///
/// Identical blobs match without being decoded at all. Otherwise both sides
/// must bounce and an error from either side is returned as is.
pub fn are_effective_match(a: &[u8], b: &[u8]) -> Result<bool, CertificateError> {
    if a == b {
        return Ok(true);
    }
    let a = bounce(a)?;
    let b = bounce(b)?;
    Ok(a == b)
}

/// Human readable subject of a certificate, e.g. `CN=FDroid,OU=FDroid,...`
pub fn subject(cert: &Certificate) -> String {
    cert.tbs_certificate.subject.to_string()
}
