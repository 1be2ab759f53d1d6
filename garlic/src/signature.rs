use std::fmt::{Debug, Display, Formatter};

use sha2::{Digest, Sha256};

use crate::cert::{self, CertificateError};

pub const HEX_BYTES_LOWER: &[u8; 16] = b"0123456789abcdef";

/// Opaque signing certificate blob for a package.
///
/// The bytes are whatever the package manager hands out for a signer, which
/// is normally a single DER encoded X.509 certificate. Equality is plain byte
/// equality, use [Signature::are_effective_match] to compare certificates
/// that may have been re-encoded.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Signature {
    bytes: Vec<u8>,
}

fn decode_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Signature {
    pub fn new<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Parse a hex encoded signature.
    ///
    /// Both cases are accepted and ASCII whitespace is skipped so long
    /// certificates can be wrapped in config files. An odd number of digits
    /// or any other character is an error carrying the offending offset.
    pub fn from_hex(text: &str) -> crate::Result<Self> {
        let mut bytes = Vec::with_capacity(text.len() / 2);
        let mut high: Option<u8> = None;

        for (idx, c) in text.bytes().enumerate() {
            if c.is_ascii_whitespace() {
                continue;
            }
            let nibble = decode_nibble(c).ok_or(crate::Error::InvalidHex(idx))?;
            match high.take() {
                None => high = Some(nibble),
                Some(h) => bytes.push((h << 4) | nibble),
            }
        }

        if high.is_some() {
            return Err(crate::Error::InvalidHex(text.len()));
        }

        Ok(Self { bytes })
    }

    /// Lowercase hex form, the inverse of [Signature::from_hex]
    pub fn to_chars_string(&self) -> String {
        let mut into = String::with_capacity(self.bytes.len() * 2);
        for b in &self.bytes {
            into.push(HEX_BYTES_LOWER[(b >> 4) as usize] as char);
            into.push(HEX_BYTES_LOWER[(b & 0xF) as usize] as char);
        }
        into
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Join the given signatures in order into a single blob. This is how a
    /// multi-signer package is compared against a single pinned certificate.
    pub fn concat<'a, I>(sigs: I) -> Self
    where
        I: IntoIterator<Item = &'a Signature>,
    {
        let mut bytes = Vec::new();
        for sig in sigs {
            bytes.extend_from_slice(&sig.bytes);
        }
        Self { bytes }
    }

    /// SHA-256 of the raw bytes as lowercase hex
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes);
        Signature::new(digest.as_slice()).to_chars_string()
    }

    /// Compare two signatures, tolerating different encodings of the same
    /// certificate. See [cert::are_effective_match].
    pub fn are_effective_match(a: &Signature, b: &Signature) -> Result<bool, CertificateError> {
        cert::are_effective_match(a.as_bytes(), b.as_bytes())
    }
}

impl From<Vec<u8>> for Signature {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl From<&[u8]> for Signature {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes, {})", self.len(), self.fingerprint())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_chars_string())
    }
}
