//! The whitespace-separated primitive grammar.
//!
//! Integers, bit-fields, brace-delimited lists, arrays and nine-field time
//! tuples, as they appear between Hollerith strings in requests and
//! responses. Stream readers operate byte-at-a-time on an `AsyncRead`
//! (the engine hands decoders a buffered reader); the `*_from_str` variants
//! walk regions that have already been read into memory.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::OffsetComponents;
use std::fmt::Write as _;
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CodecError;

/// Sentinel for [`read_delimited`]: no opening delimiter is expected.
pub const NO_OPEN: u8 = 0;

/// Scans an unsigned 32-bit integer.
///
/// Leading spaces are skipped, ASCII digits are folded into the accumulator,
/// and the single byte terminating the run of digits is consumed. This
/// doubles as the separator skipper everywhere the grammar reads
/// "integer then one space". A stream that ends mid-scan terminates it;
/// the accumulated value is returned.
pub async fn read_u32<R>(reader: &mut R) -> Result<u32, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut acc: u32 = 0;
    let mut leading = true;
    loop {
        let b = match reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(acc),
            Err(e) => return Err(e.into()),
        };
        match b {
            b' ' if leading => {}
            b'0'..=b'9' => {
                leading = false;
                acc = acc.wrapping_mul(10).wrapping_add(u32::from(b - b'0'));
            }
            _ => return Ok(acc),
        }
    }
}

/// 16-bit variant of [`read_u32`], for conference and person numbers and the
/// small counters.
pub async fn read_u16<R>(reader: &mut R) -> Result<u16, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut acc: u16 = 0;
    let mut leading = true;
    loop {
        let b = match reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(acc),
            Err(e) => return Err(e.into()),
        };
        match b {
            b' ' if leading => {}
            b'0'..=b'9' => {
                leading = false;
                acc = acc.wrapping_mul(10).wrapping_add(u16::from(b - b'0'));
            }
            _ => return Ok(acc),
        }
    }
}

/// Scans an unsigned integer from an in-memory buffer. Any non-digit prefix
/// is skipped; the scan stops *before* the first non-digit after the number.
/// Returns the value and the offset of that stopping byte (or the buffer
/// length if the digits ran to the end).
pub fn u32_from_str(s: &str, start: usize) -> (u32, usize) {
    let bytes = s.as_bytes();
    let mut pos = start;
    let mut acc: u32 = 0;
    let mut started = false;
    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_digit() {
            started = true;
            acc = acc.wrapping_mul(10).wrapping_add(u32::from(b - b'0'));
            pos += 1;
        } else if started {
            break;
        } else {
            pos += 1;
        }
    }
    (acc, pos)
}

/// Reads a fixed-width binary bit-field: exactly `width` ASCII `0`/`1`
/// characters (leading spaces skipped), MSB first. `width` is at most 16.
pub async fn read_bitfield<R>(reader: &mut R, width: u32) -> Result<u16, CodecError>
where
    R: AsyncRead + Unpin,
{
    debug_assert!(width <= 16);
    let mut bits: u16 = 0;
    let mut read = 0;
    while read < width {
        let b = reader.read_u8().await?;
        match b {
            b' ' if read == 0 => {}
            b'0' => {
                bits <<= 1;
                read += 1;
            }
            b'1' => {
                bits = (bits << 1) | 1;
                read += 1;
            }
            other => return Err(CodecError::InvalidBitField(other)),
        }
    }
    Ok(bits)
}

/// Reads a delimited list verbatim, including both delimiters and any
/// interior whitespace. When `open` is [`NO_OPEN`] the first byte is not
/// checked. Tokenizing the contents is the caller's business.
pub async fn read_delimited<R>(reader: &mut R, open: u8, close: u8) -> Result<String, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut out = Vec::new();
    let first = reader.read_u8().await?;
    if open != NO_OPEN && first != open {
        tracing::error!(found = first, expected = open, "unexpected start of list");
        return Err(CodecError::UnexpectedDelimiter {
            expected: open as char,
            found: first,
        });
    }
    out.push(first);
    loop {
        let b = reader.read_u8().await?;
        out.push(b);
        if b == close {
            return Ok(String::from_utf8_lossy(&out).into_owned());
        }
    }
}

/// Consumes bytes through the next line feed. Decoders call this to land on
/// the response boundary when their grammar does not already end on an
/// integer whose terminator was the newline.
pub async fn skip_to_newline<R>(reader: &mut R) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if reader.read_u8().await? == b'\n' {
            return Ok(());
        }
    }
}

/// Appends the array encoding `<n> { a b … }` to `out`.
pub fn write_u32_array(out: &mut String, items: &[u32]) {
    let _ = write!(out, "{} {{ ", items.len());
    for v in items {
        let _ = write!(out, "{v} ");
    }
    out.push('}');
}

/// Reads an array of unsigned integers: a count, then a brace-delimited
/// region holding exactly that many items. A count mismatch or a malformed
/// item is an error. The region's trailing newline is *not* consumed.
pub async fn read_u32_array<R>(reader: &mut R) -> Result<Vec<u32>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let count = read_u32(reader).await? as usize;
    let region = read_delimited(reader, b'{', b'}').await?;
    parse_u32_region(&region, count)
}

/// Tokenizes the interior of a brace region into exactly `count` integers.
pub fn parse_u32_region(region: &str, count: usize) -> Result<Vec<u32>, CodecError> {
    let interior = region
        .trim_start_matches('{')
        .trim_end_matches('}');
    let mut items = Vec::with_capacity(count.min(1024));
    for token in interior.split_whitespace() {
        let value: u32 = token
            .parse()
            .map_err(|_| CodecError::InvalidInteger(token.to_string()))?;
        items.push(value);
    }
    if items.len() != count {
        return Err(CodecError::ArrayLength {
            expected: count,
            found: items.len(),
        });
    }
    Ok(items)
}

/// Reads the nine-field time tuple
/// `sec min hour mday mon year wday yday isdst` and constructs the instant
/// in UTC. `mon` is zero-based and `year` counts from 1900; the final three
/// fields are informational and discarded.
pub async fn read_time<R>(reader: &mut R) -> Result<DateTime<Utc>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let sec = read_u32(reader).await?;
    let min = read_u32(reader).await?;
    let hour = read_u32(reader).await?;
    let mday = read_u32(reader).await?;
    let mon = read_u32(reader).await?;
    let year = read_u32(reader).await?;
    let _wday = read_u32(reader).await?;
    let _yday = read_u32(reader).await?;
    let _isdst = read_u32(reader).await?;

    Utc.with_ymd_and_hms(1900 + year as i32, mon + 1, mday, hour, min, sec)
        .single()
        .ok_or(CodecError::InvalidTime)
}

/// Appends the nine-field tuple for `when` to `out`. The weekday, ordinal
/// day and DST flag are computed from the instant in its stated time zone,
/// which is why the offset must expose its DST component.
pub fn write_time<Tz>(out: &mut String, when: &DateTime<Tz>)
where
    Tz: TimeZone,
    Tz::Offset: OffsetComponents,
{
    let isdst = u8::from(!when.offset().dst_offset().is_zero());
    let _ = write!(
        out,
        "{} {} {} {} {} {} {} {} {}",
        when.second(),
        when.minute(),
        when.hour(),
        when.day(),
        when.month0(),
        when.year() - 1900,
        when.weekday().num_days_from_sunday(),
        when.ordinal0(),
        isdst,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Stockholm;

    #[tokio::test]
    async fn read_u32_folds_digits_and_swallows_the_separator() {
        let cases: [(&[u8], u32, &[u8]); 6] = [
            (b"2 ", 2, b""),
            (b"2 22", 2, b"22"),
            (b"22 ", 22, b""),
            (b"012", 12, b""),
            (b"0 ", 0, b""),
            (b"990099 ", 990099, b""),
        ];
        for (data, expected, rest) in cases {
            let mut cursor = data;
            assert_eq!(read_u32(&mut cursor).await.unwrap(), expected);
            assert_eq!(cursor, rest);
        }
    }

    #[tokio::test]
    async fn read_u32_skips_leading_spaces() {
        let mut data: &[u8] = b"  17 x";
        assert_eq!(read_u32(&mut data).await.unwrap(), 17);
        assert_eq!(data, b"x");
    }

    #[tokio::test]
    async fn read_u16_matches_narrow_width() {
        let mut data: &[u8] = b"6 77";
        assert_eq!(read_u16(&mut data).await.unwrap(), 6);
        assert_eq!(read_u16(&mut data).await.unwrap(), 77);
    }

    #[test]
    fn u32_from_str_stops_before_the_terminator() {
        assert_eq!(u32_from_str("10 21H", 0), (10, 2));
        assert_eq!(u32_from_str(" { 42 }", 0), (42, 5));
        assert_eq!(u32_from_str("abc", 0), (0, 3));
        assert_eq!(u32_from_str("11", 0), (11, 2));
    }

    #[tokio::test]
    async fn bitfield_is_msb_first() {
        let mut data: &[u8] = b"00001000";
        assert_eq!(read_bitfield(&mut data, 8).await.unwrap(), 0b0000_1000);

        let mut data: &[u8] = b" 1100010000000000";
        assert_eq!(
            read_bitfield(&mut data, 16).await.unwrap(),
            0b1100_0100_0000_0000
        );
    }

    #[tokio::test]
    async fn bitfield_rejects_other_characters() {
        let mut data: &[u8] = b"0102";
        assert!(matches!(
            read_bitfield(&mut data, 4).await,
            Err(CodecError::InvalidBitField(b'2'))
        ));
    }

    #[tokio::test]
    async fn delimited_list_keeps_delimiters_and_interior_whitespace() {
        let mut data: &[u8] = b"{ 13020 100 13043 95 }\n";
        let region = read_delimited(&mut data, b'{', b'}').await.unwrap();
        assert_eq!(region, "{ 13020 100 13043 95 }");
        assert_eq!(data, b"\n");
    }

    #[tokio::test]
    async fn delimited_list_rejects_wrong_opener() {
        let mut data: &[u8] = b"[ 1 ]";
        assert!(matches!(
            read_delimited(&mut data, b'{', b'}').await,
            Err(CodecError::UnexpectedDelimiter { found: b'[', .. })
        ));
    }

    #[tokio::test]
    async fn delimited_list_sentinel_skips_open_check() {
        let mut data: &[u8] = b"1 2 3 }";
        let region = read_delimited(&mut data, NO_OPEN, b'}').await.unwrap();
        assert_eq!(region, "1 2 3 }");
    }

    #[test]
    fn array_encoding_matches_the_grammar() {
        let mut out = String::new();
        write_u32_array(&mut out, &[13020, 13043]);
        assert_eq!(out, "2 { 13020 13043 }");

        let mut out = String::new();
        write_u32_array(&mut out, &[]);
        assert_eq!(out, "0 { }");
    }

    #[tokio::test]
    async fn array_round_trip() {
        let mut encoded = String::new();
        write_u32_array(&mut encoded, &[1, 22, 333]);
        let mut cursor = encoded.as_bytes();
        assert_eq!(read_u32_array(&mut cursor).await.unwrap(), vec![1, 22, 333]);
    }

    #[tokio::test]
    async fn array_count_mismatch_is_an_error() {
        let mut data: &[u8] = b"4 { 1 2 3 }";
        assert!(matches!(
            read_u32_array(&mut data).await,
            Err(CodecError::ArrayLength {
                expected: 4,
                found: 3
            })
        ));
    }

    #[tokio::test]
    async fn array_bad_token_is_an_error() {
        let mut data: &[u8] = b"2 { 1 x }";
        assert!(matches!(
            read_u32_array(&mut data).await,
            Err(CodecError::InvalidInteger(_))
        ));
    }

    #[tokio::test]
    async fn time_decode_is_utc() {
        let mut data: &[u8] = b"23 47 19 17 6 97 4 197 1";
        let when = read_time(&mut data).await.unwrap();
        assert_eq!(when, Utc.with_ymd_and_hms(1997, 7, 17, 19, 47, 23).unwrap());
    }

    #[tokio::test]
    async fn time_decode_rejects_impossible_tuples() {
        let mut data: &[u8] = b"0 0 0 42 13 97 0 0 0";
        assert!(matches!(
            read_time(&mut data).await,
            Err(CodecError::InvalidTime)
        ));
    }

    #[test]
    fn time_encode_computes_wday_yday_and_dst() {
        let when = Stockholm.with_ymd_and_hms(1997, 7, 19, 22, 6, 49).unwrap();
        let mut out = String::new();
        write_time(&mut out, &when);
        assert_eq!(out, "49 6 22 19 6 97 6 199 1");
    }

    #[test]
    fn time_encode_outside_dst() {
        let when = Stockholm.with_ymd_and_hms(1997, 1, 19, 10, 0, 0).unwrap();
        let mut out = String::new();
        write_time(&mut out, &when);
        assert_eq!(out, "0 0 10 19 0 97 0 18 0");
    }

    #[tokio::test]
    async fn time_round_trips_to_second_precision() {
        let when = chrono_tz::UTC.with_ymd_and_hms(2003, 11, 5, 8, 30, 2).unwrap();
        let mut encoded = String::new();
        write_time(&mut encoded, &when);
        let mut cursor = encoded.as_bytes();
        let back = read_time(&mut cursor).await.unwrap();
        assert_eq!(back, when);
    }
}
