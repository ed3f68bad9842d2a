//! Reading and writing Hollerith strings.
//!
//! Protocol A frames every string as `<decimal-length>H<bytes>`, where the
//! length counts bytes, not characters, and the payload is opaque. The
//! scanner tolerates leading ASCII spaces before the length digits, which is
//! how strings embedded in whitespace-separated responses are consumed.

use std::fmt::Display;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CodecError;
use crate::MAX_STRING_LEN;

/// Renders `value` through its `Display` impl and appends the Hollerith
/// framing to `out`. Returns the number of bytes written. Integers end up in
/// decimal, strings are taken as-is; there is no trailing separator.
pub fn write(out: &mut String, value: impl Display) -> usize {
    let rendered = value.to_string();
    let before = out.len();
    out.push_str(&rendered.len().to_string());
    out.push('H');
    out.push_str(&rendered);
    out.len() - before
}

/// Scans one Hollerith string from a byte stream.
///
/// Skips leading spaces, folds decimal digits into the length, consumes the
/// `H`, then reads exactly `length` payload bytes. A zero length is valid and
/// yields an empty value. The length prefix is authoritative: if the stream
/// ends before the payload is complete, the underlying read error (premature
/// EOF) propagates.
pub async fn scan<R>(reader: &mut R) -> Result<Vec<u8>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut len: u64 = 0;
    let mut seen_digit = false;
    loop {
        let b = reader.read_u8().await?;
        match b {
            b'0'..=b'9' => {
                seen_digit = true;
                len = len * 10 + u64::from(b - b'0');
                if len > MAX_STRING_LEN {
                    return Err(CodecError::OversizeString(len));
                }
            }
            b' ' if !seen_digit => {}
            b'H' => break,
            other => {
                tracing::error!(byte = other, "unexpected character in Hollerith length");
                return Err(CodecError::UnexpectedLengthCharacter(other));
            }
        }
    }

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Scans one Hollerith string from an in-memory buffer, starting at byte
/// `offset`. Returns the decoded value and the offset just past the last
/// payload byte. Used to walk compound response regions that have already
/// been read into memory; the payload is decoded lossily since these are
/// display names.
pub fn scan_str(s: &str, offset: usize) -> Result<(String, usize), CodecError> {
    let bytes = s.as_bytes();
    let mut pos = offset;
    let mut len: usize = 0;
    let mut seen_digit = false;
    loop {
        match bytes.get(pos) {
            Some(b @ b'0'..=b'9') => {
                seen_digit = true;
                len = len * 10 + usize::from(b - b'0');
                pos += 1;
            }
            Some(b' ') if !seen_digit => pos += 1,
            Some(&b'H') => {
                pos += 1;
                break;
            }
            Some(&other) => return Err(CodecError::UnexpectedLengthCharacter(other)),
            None => return Err(CodecError::Truncated),
        }
    }

    let end = pos + len;
    if end > bytes.len() {
        return Err(CodecError::Truncated);
    }
    Ok((
        String::from_utf8_lossy(&bytes[pos..end]).into_owned(),
        end,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_frames_values() {
        let cases: [(&dyn std::fmt::Display, &str); 4] = [
            (&1u32, "1H1"),
            (&"1", "1H1"),
            (&"1H1", "3H1H1"),
            (&"räksmörgås", "13Hräksmörgås"),
        ];
        for (value, expected) in cases {
            let mut out = String::new();
            let n = write(&mut out, value);
            assert_eq!(out, expected);
            assert_eq!(n, expected.len());
        }
    }

    #[test]
    fn write_length_counts_bytes_not_chars() {
        let mut out = String::new();
        write(&mut out, "räksmörgås");
        // 10 characters, 13 bytes in UTF-8.
        assert!(out.starts_with("13H"));
    }

    #[tokio::test]
    async fn scan_reads_exact_payload() {
        let mut data: &[u8] = b"13Hr\xc3\xa4ksm\xc3\xb6rg\xc3\xa5s";
        let value = scan(&mut data).await.unwrap();
        assert_eq!(value, "räksmörgås".as_bytes());
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn scan_payload_may_contain_digits_and_h() {
        let mut data: &[u8] = b"3H1H1";
        assert_eq!(scan(&mut data).await.unwrap(), b"1H1");
    }

    #[tokio::test]
    async fn scan_zero_length_consumes_two_bytes() {
        let mut data: &[u8] = b"0Hrest";
        assert_eq!(scan(&mut data).await.unwrap(), b"");
        assert_eq!(data, b"rest");
    }

    #[tokio::test]
    async fn scan_tolerates_leading_spaces() {
        // Four bytes of "räksmörgås" are the three characters "räk".
        let mut data: &[u8] = " 4Hräksmörgås".as_bytes();
        let value = scan(&mut data).await.unwrap();
        assert_eq!(value, "räk".as_bytes());
    }

    #[tokio::test]
    async fn scan_rejects_bad_length_character() {
        let mut data: &[u8] = b"13%Hhalvah";
        match scan(&mut data).await {
            Err(CodecError::UnexpectedLengthCharacter(b'%')) => {}
            other => panic!("expected length-character error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_underrun_is_an_io_error() {
        let mut data: &[u8] = "130Hräksmörgås".as_bytes();
        match scan(&mut data).await {
            Err(CodecError::Io(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected I/O error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_rejects_oversize_length() {
        let mut data: &[u8] = b"99999999999Hx";
        assert!(matches!(
            scan(&mut data).await,
            Err(CodecError::OversizeString(_))
        ));
    }

    #[test]
    fn scan_str_returns_next_offset() {
        let s = "15HTest Conference 0000 10";
        let (name, next) = scan_str(s, 0).unwrap();
        assert_eq!(name, "Test Conference");
        assert_eq!(&s[next..], " 0000 10");
    }

    #[test]
    fn scan_str_skips_leading_spaces() {
        let (name, next) = scan_str("   4HJohn rest", 0).unwrap();
        assert_eq!(name, "John");
        assert_eq!(next, 9);
    }

    #[test]
    fn scan_str_truncated_buffer() {
        assert!(matches!(
            scan_str("10Hshort", 0),
            Err(CodecError::Truncated)
        ));
        assert!(matches!(scan_str("12", 0), Err(CodecError::Truncated)));
    }

    #[test]
    fn round_trip_preserves_arbitrary_strings() {
        for original in ["", "a b c", "12H", "}{", "spaces  and  H9H"] {
            let mut framed = String::new();
            write(&mut framed, original);
            let (back, next) = scan_str(&framed, 0).unwrap();
            assert_eq!(back, original);
            assert_eq!(next, framed.len());
        }
    }
}
