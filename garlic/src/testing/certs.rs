//! Certificates for tests

use crate::installers::{AURORA_STORE_CERT, FDROID_BASIC_CERT};
use crate::Signature;

pub fn aurora_cert() -> Signature {
    Signature::from_hex(AURORA_STORE_CERT).expect("aurora cert")
}

pub fn fdroid_cert() -> Signature {
    Signature::from_hex(FDROID_BASIC_CERT).expect("fdroid cert")
}

/// A freshly generated self-signed certificate
pub fn generated_cert() -> Signature {
    let cert = rcgen::generate_simple_self_signed(vec!["garlic.test".to_string()])
        .expect("generating certificate");
    Signature::new(cert.serialize_der().expect("serializing certificate"))
}

/// Re-encode the outermost length of `sig` with `pad` extra leading zero
/// octets. The result is the same certificate in a different (BER) layout.
pub fn pad_outer_length(sig: &Signature, pad: usize) -> Signature {
    let bytes = sig.as_bytes();
    let len_byte = bytes[1];
    let (len_octets, rest) = if len_byte & 0x80 == 0 {
        (vec![len_byte], &bytes[2..])
    } else {
        let n = (len_byte & 0x7F) as usize;
        (bytes[2..2 + n].to_vec(), &bytes[2 + n..])
    };

    let mut out = vec![bytes[0], 0x80 | (len_octets.len() + pad) as u8];
    out.extend(std::iter::repeat(0u8).take(pad));
    out.extend_from_slice(&len_octets);
    out.extend_from_slice(rest);
    Signature::new(out)
}
