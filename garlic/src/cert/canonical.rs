//! Re-encode a BER TLV into DER length form.
//!
//! `der` refuses anything that isn't already minimally encoded, so the
//! lengths are normalised here before the certificate is handed to it.
//! Only the length octets are rewritten: identifiers and primitive contents
//! are copied as they are. Indefinite lengths are not supported.

use super::CertificateError;

/// Deepest nesting accepted before giving up
pub const MAX_DEPTH: usize = 64;

struct Header {
    ident_len: usize,
    constructed: bool,
    content_start: usize,
    content_len: usize,
}

fn byte_at(input: &[u8], pos: usize, base: usize) -> Result<u8, CertificateError> {
    input
        .get(pos)
        .copied()
        .ok_or(CertificateError::Truncated(base + pos))
}

fn read_header(input: &[u8], base: usize) -> Result<Header, CertificateError> {
    let first = byte_at(input, 0, base)?;
    let mut pos = 1;

    // High tag number form, the tag continues while the top bit is set
    if first & 0x1F == 0x1F {
        loop {
            let b = byte_at(input, pos, base)?;
            pos += 1;
            if b & 0x80 == 0 {
                break;
            }
        }
    }

    let ident_len = pos;
    let len_byte = byte_at(input, pos, base)?;
    pos += 1;

    let content_len = if len_byte < 0x80 {
        len_byte as usize
    } else if len_byte == 0x80 {
        return Err(CertificateError::IndefiniteLength(base + pos - 1));
    } else {
        let n = (len_byte & 0x7F) as usize;
        let mut len: usize = 0;
        for _ in 0..n {
            let b = byte_at(input, pos, base)?;
            pos += 1;
            len = len
                .checked_mul(256)
                .and_then(|l| l.checked_add(b as usize))
                .ok_or(CertificateError::LengthOverflow(base + ident_len))?;
        }
        len
    };

    if input.len() - pos < content_len {
        return Err(CertificateError::Truncated(base + input.len()));
    }

    Ok(Header {
        ident_len,
        constructed: first & 0x20 != 0,
        content_start: pos,
        content_len,
    })
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let be = len.to_be_bytes();
    let skip = be.iter().take_while(|b| **b == 0).count();
    let significant = &be[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

fn canonicalize_tlv(
    input: &[u8],
    base: usize,
    depth: usize,
    out: &mut Vec<u8>,
) -> Result<usize, CertificateError> {
    if depth > MAX_DEPTH {
        return Err(CertificateError::TooDeep(MAX_DEPTH));
    }

    let hdr = read_header(input, base)?;
    let end = hdr.content_start + hdr.content_len;
    let content = &input[hdr.content_start..end];

    out.extend_from_slice(&input[..hdr.ident_len]);

    if hdr.constructed {
        let mut body = Vec::with_capacity(content.len());
        let mut pos = 0;
        while pos < content.len() {
            pos += canonicalize_tlv(
                &content[pos..],
                base + hdr.content_start + pos,
                depth + 1,
                &mut body,
            )?;
        }
        write_length(out, body.len());
        out.extend_from_slice(&body);
    } else {
        write_length(out, content.len());
        out.extend_from_slice(content);
    }

    Ok(end)
}

/// Canonicalise the first TLV of `input`.
///
/// Returns the DER bytes and the number of input bytes the TLV occupied.
/// Anything after the first TLV is left untouched.
pub fn canonicalize_first(input: &[u8]) -> Result<(Vec<u8>, usize), CertificateError> {
    let mut out = Vec::with_capacity(input.len());
    let consumed = canonicalize_tlv(input, 0, 0, &mut out)?;
    Ok((out, consumed))
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case::already_der(&[0x02, 0x01, 0x05], &[0x02, 0x01, 0x05])]
    #[case::long_form_short_value(&[0x02, 0x81, 0x01, 0x05], &[0x02, 0x01, 0x05])]
    #[case::padded_long_form(&[0x04, 0x83, 0x00, 0x00, 0x01, 0xAA], &[0x04, 0x01, 0xAA])]
    #[case::nested(
        &[0x30, 0x82, 0x00, 0x06, 0x02, 0x81, 0x01, 0x05, 0x05, 0x00],
        &[0x30, 0x05, 0x02, 0x01, 0x05, 0x05, 0x00]
    )]
    #[case::high_tag(&[0xBF, 0x81, 0x01, 0x81, 0x00], &[0xBF, 0x81, 0x01, 0x00])]
    fn test_canonicalize(#[case] input: &[u8], #[case] expected: &[u8]) {
        let (out, consumed) = canonicalize_first(input).expect("should canonicalize");
        assert_eq!(out.as_slice(), expected);
        assert_eq!(consumed, input.len());
    }

    #[test]
    fn test_trailing_data_is_left_alone() {
        let input = [0x02, 0x01, 0x05, 0xFF, 0xFF];
        let (out, consumed) = canonicalize_first(&input).unwrap();
        assert_eq!(out, vec![0x02, 0x01, 0x05]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_long_lengths_stay_long_form() {
        let mut input = vec![0x04, 0x84, 0x00, 0x00, 0x01, 0x00];
        input.extend(std::iter::repeat(0xAB).take(256));
        let (out, _) = canonicalize_first(&input).unwrap();
        assert_eq!(&out[..4], &[0x04, 0x82, 0x01, 0x00]);
        assert_eq!(out.len(), 4 + 256);
    }

    #[rstest]
    #[case::empty(&[], CertificateError::Truncated(0))]
    #[case::missing_length(&[0x30], CertificateError::Truncated(1))]
    #[case::short_content(&[0x30, 0x03, 0x02, 0x01], CertificateError::Truncated(4))]
    #[case::indefinite(&[0x30, 0x80, 0x00, 0x00], CertificateError::IndefiniteLength(1))]
    #[case::bad_child(&[0x30, 0x02, 0x02, 0x05], CertificateError::Truncated(4))]
    fn test_canonicalize_errors(#[case] input: &[u8], #[case] expected: CertificateError) {
        assert_eq!(canonicalize_first(input).unwrap_err(), expected);
    }

    #[test]
    fn test_too_deep() {
        let mut input = Vec::new();
        for _ in 0..MAX_DEPTH + 2 {
            let mut wrapped = vec![0x30];
            write_length(&mut wrapped, input.len());
            wrapped.extend_from_slice(&input);
            input = wrapped;
        }
        assert_eq!(
            canonicalize_first(&input).unwrap_err(),
            CertificateError::TooDeep(MAX_DEPTH)
        );
    }
}
