// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! ASN.1/BER primitives for the MMS subset used by report control blocks
//!
//! Encoding covers the value types written to an RCB (IA5String, boolean,
//! unsigned, bit string, octet string); decoding covers the full `Data`
//! universe seen in `informationReport` access results, including the two
//! IEC 61850 time flavours. Decoding never fails: anything the codec does
//! not understand is preserved as [`Data::Unknown`].

use super::constant;
use byteorder::{BigEndian, ByteOrder};
use chrono::DateTime;
use std::fmt;

pub const TAG_IA5_STRING: u8 = 0x1A;
pub const TAG_SEQUENCE: u8 = 0x30;
/// \[APPLICATION 1\], the outer MMS PDU wrapper
pub const TAG_MMS_PDU: u8 = 0x61;
/// visible-string as context tag 0 inside `Data`
pub const TAG_CTX_VISIBLE_STRING: u8 = 0x80;
pub const TAG_BOOLEAN: u8 = 0x83;
pub const TAG_BIT_STRING: u8 = 0x84;
/// unsigned with a single value byte
pub const TAG_UNSIGNED_BYTE: u8 = 0x85;
/// unsigned with two or more value bytes
pub const TAG_UNSIGNED: u8 = 0x86;
pub const TAG_FLOATING_POINT: u8 = 0x87;
pub const TAG_OCTET_STRING: u8 = 0x89;
pub const TAG_VISIBLE_STRING: u8 = 0x8A;
pub const TAG_BINARY_TIME: u8 = 0x8C;
pub const TAG_UTC_TIME: u8 = 0x91;
pub const TAG_STRUCTURE: u8 = 0xA2;

/// constructed bit of a BER tag byte
pub const CONSTRUCTED: u8 = 0x20;

// Definite length octets: short form below 128, long form above.
fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let mut be = len.to_be_bytes().to_vec();
    while be.len() > 1 && be[0] == 0 {
        be.remove(0);
    }
    let mut out = vec![0x80 | be.len() as u8];
    out.extend_from_slice(&be);
    out
}

/// Assembles one TLV from a tag and its content.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + content.len());
    out.push(tag);
    out.extend_from_slice(&encode_length(content.len()));
    out.extend_from_slice(content);
    out
}

/// Encodes an IA5String: `1a len ascii`.
pub fn encode_ia5(s: &str) -> Vec<u8> {
    tlv(TAG_IA5_STRING, s.as_bytes())
}

/// Encodes a `Data` boolean: `83 01 01` or `83 01 00`.
pub fn encode_boolean(val: bool) -> Vec<u8> {
    vec![TAG_BOOLEAN, 0x01, val as u8]
}

/// Encodes a `Data` unsigned with the minimum number of value bytes.
///
/// Values below 256 use the one-byte form `85 01 n`, everything else the
/// multi-byte form `86 k ...` without redundant leading zeros.
pub fn encode_unsigned(val: u32) -> Vec<u8> {
    if val < 0x100 {
        return vec![TAG_UNSIGNED_BYTE, 0x01, val as u8];
    }
    if val < 0x1_0000 {
        return vec![TAG_UNSIGNED, 0x02, (val >> 8) as u8, val as u8];
    }
    let mut be = val.to_be_bytes().to_vec();
    while be.len() > 1 && be[0] == 0 {
        be.remove(0);
    }
    tlv(TAG_UNSIGNED, &be)
}

/// Encodes a `Data` bit string. `bits` must already carry the BER
/// padding indicator as its first byte.
pub fn encode_bit_string(bits: &[u8]) -> Vec<u8> {
    tlv(TAG_BIT_STRING, bits)
}

/// Encodes a `Data` octet string.
pub fn encode_octet_string(val: &[u8]) -> Vec<u8> {
    tlv(TAG_OCTET_STRING, val)
}

/// One tag-length-value element viewed inside a BER buffer.
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Reads the TLV at the start of `buf`; returns it and the bytes consumed.
///
/// `None` on anything malformed: missing bytes, indefinite length, or a
/// length running past the buffer.
pub fn read_tlv(buf: &[u8]) -> Option<(Tlv, usize)> {
    if buf.len() < 2 {
        return None;
    }
    let tag = buf[0];
    let first = buf[1];

    let (len, header) = if first < 0x80 {
        (first as usize, 2)
    } else {
        let n = (first & 0x7F) as usize;
        if n == 0 || n > 4 || buf.len() < 2 + n {
            return None;
        }
        let mut len = 0usize;
        for &b in &buf[2..2 + n] {
            len = (len << 8) | b as usize;
        }
        (len, 2 + n)
    };

    if buf.len() < header + len {
        return None;
    }
    Some((
        Tlv {
            tag,
            value: &buf[header..header + len],
        },
        header + len,
    ))
}

/// A decoded MMS `Data` value.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    Boolean(bool),
    Unsigned(u64),
    /// raw bit string bytes, padding indicator included
    BitString(Vec<u8>),
    OctetString(Vec<u8>),
    VisibleString(String),
    Float(f64),
    /// ISO-8601 UTC timestamp, or the raw hex when the field is invalid
    BinaryTime(String),
    /// same convention as [`Data::BinaryTime`]
    UtcTime(String),
    Structure(Vec<Data>),
    /// tag and value bytes of anything the codec does not understand
    Unknown(u8, Vec<u8>),
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Data::Boolean(b) => write!(f, "{}", b),
            Data::Unsigned(n) => write!(f, "{}", n),
            Data::BitString(bits) => write!(f, "bits:{}", hex_str(bits)),
            Data::OctetString(bytes) => write!(f, "octets:{}", hex_str(bytes)),
            Data::VisibleString(s) => write!(f, "{}", s),
            Data::Float(v) => write!(f, "{}", v),
            Data::BinaryTime(t) | Data::UtcTime(t) => write!(f, "{}", t),
            Data::Structure(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Data::Unknown(tag, bytes) => write!(f, "<unknown {:#04x}:{}>", tag, hex_str(bytes)),
        }
    }
}

/// Decodes one `Data` TLV, recursing into constructed values.
pub fn decode_data(tlv: &Tlv) -> Data {
    match tlv.tag {
        TAG_CTX_VISIBLE_STRING | TAG_VISIBLE_STRING | TAG_IA5_STRING => {
            Data::VisibleString(String::from_utf8_lossy(tlv.value).into_owned())
        }
        TAG_BOOLEAN => Data::Boolean(tlv.value.first().map_or(false, |&b| b != 0)),
        TAG_BIT_STRING => Data::BitString(tlv.value.to_vec()),
        TAG_UNSIGNED_BYTE | TAG_UNSIGNED => decode_unsigned(tlv),
        TAG_FLOATING_POINT => decode_float(tlv),
        TAG_OCTET_STRING => Data::OctetString(tlv.value.to_vec()),
        TAG_BINARY_TIME => Data::BinaryTime(decode_timestamp(tlv.value)),
        TAG_UTC_TIME => Data::UtcTime(decode_timestamp(tlv.value)),
        tag if tag & CONSTRUCTED != 0 => Data::Structure(decode_data_sequence(tlv.value)),
        tag => Data::Unknown(tag, tlv.value.to_vec()),
    }
}

/// Decodes back-to-back `Data` TLVs until the buffer ends or turns sour.
pub fn decode_data_sequence(mut buf: &[u8]) -> Vec<Data> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        match read_tlv(buf) {
            Some((tlv, used)) => {
                out.push(decode_data(&tlv));
                buf = &buf[used..];
            }
            None => break,
        }
    }
    out
}

fn decode_unsigned(tlv: &Tlv) -> Data {
    if tlv.value.is_empty() || tlv.value.len() > 8 {
        return Data::Unknown(tlv.tag, tlv.value.to_vec());
    }
    let mut n = 0u64;
    for &b in tlv.value {
        n = (n << 8) | b as u64;
    }
    Data::Unsigned(n)
}

// First byte is the format descriptor, the remainder an IEEE-754 single
// or double. Values are rounded to six decimals on output.
fn decode_float(tlv: &Tlv) -> Data {
    let raw = match tlv.value.len() {
        5 => BigEndian::read_f32(&tlv.value[1..]) as f64,
        9 => BigEndian::read_f64(&tlv.value[1..]),
        _ => return Data::Unknown(tlv.tag, tlv.value.to_vec()),
    };
    Data::Float((raw * 1e6).round() / 1e6)
}

// Seconds live in the first 4 bytes, big-endian, counted from 1984-01-01
// or from the UNIX epoch; the threshold keeps both readable because the
// ranges stopped overlapping around 2001. Optional bytes [4..6] carry a
// 1/65536 s fraction. Invalid input degrades to its hex form.
fn decode_timestamp(value: &[u8]) -> String {
    if value.len() < 4 {
        return hex_str(value);
    }
    let raw = BigEndian::read_u32(&value[..4]);
    if raw >= 0x8000_0000 {
        return hex_str(value);
    }

    let secs = if raw >= constant::EPOCH_DISAMBIGUATION_SECS {
        i64::from(raw)
    } else {
        i64::from(raw) + constant::EPOCH_1984_OFFSET_SECS
    };

    let fraction = if value.len() >= 6 {
        Some(BigEndian::read_u16(&value[4..6]))
    } else {
        None
    };
    let nanos = match fraction {
        Some(f) => ((u64::from(f) * 1_000_000_000) >> 16) as u32,
        None => 0,
    };

    match DateTime::from_timestamp(secs, nanos) {
        Some(ts) if fraction.is_some() => ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        Some(ts) => ts.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => hex_str(value),
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Lowercase hex rendering of a byte slice.
pub fn hex_str(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX_DIGITS[(b >> 4) as usize] as char);
        s.push(HEX_DIGITS[(b & 0x0F) as usize] as char);
    }
    s
}

#[cfg(test)]
fn decode_one(bytes: &[u8]) -> Data {
    let (tlv, used) = read_tlv(bytes).unwrap();
    assert_eq!(used, bytes.len());
    decode_data(&tlv)
}

#[test]
fn test_boolean_roundtrip() {
    assert_eq!(encode_boolean(true), vec![0x83, 0x01, 0x01]);
    assert_eq!(encode_boolean(false), vec![0x83, 0x01, 0x00]);
    assert_eq!(decode_one(&encode_boolean(true)), Data::Boolean(true));
    assert_eq!(decode_one(&encode_boolean(false)), Data::Boolean(false));
}

#[test]
fn test_unsigned_minimal_forms() {
    assert_eq!(encode_unsigned(5), vec![0x85, 0x01, 0x05]);
    assert_eq!(encode_unsigned(2000), vec![0x86, 0x02, 0x07, 0xD0]);
    assert_eq!(encode_unsigned(65536), vec![0x86, 0x03, 0x01, 0x00, 0x00]);
}

#[test]
fn test_unsigned_roundtrip() {
    for val in [0u32, 1, 5, 255, 256, 2000, 65535, 65536, 0xDEAD_BEEF, u32::MAX] {
        assert_eq!(decode_one(&encode_unsigned(val)), Data::Unsigned(u64::from(val)));
    }
}

#[test]
fn test_ia5_roundtrip() {
    assert_eq!(encode_ia5("AB"), vec![0x1A, 0x02, 0x41, 0x42]);
    for len in [0usize, 1, 127, 128, 255] {
        let s = "x".repeat(len);
        assert_eq!(decode_one(&encode_ia5(&s)), Data::VisibleString(s));
    }
}

#[test]
fn test_octet_string_roundtrip() {
    for len in [0usize, 1, 127, 128, 255] {
        let bytes = vec![0x5A; len];
        assert_eq!(
            decode_one(&encode_octet_string(&bytes)),
            Data::OctetString(bytes)
        );
    }
}

#[test]
fn test_bit_string_roundtrip() {
    let bits = [0x06, 0x7B, 0x00];
    assert_eq!(encode_bit_string(&bits), vec![0x84, 0x03, 0x06, 0x7B, 0x00]);
    assert_eq!(decode_one(&encode_bit_string(&bits)), Data::BitString(bits.to_vec()));
}

#[test]
fn test_long_form_length() {
    let bytes = vec![0x11; 200];
    let encoded = encode_octet_string(&bytes);
    assert_eq!(&encoded[..3], &[0x89, 0x81, 200]);
    let (tlv, used) = read_tlv(&encoded).unwrap();
    assert_eq!(used, encoded.len());
    assert_eq!(tlv.value, &bytes[..]);
}

#[test]
fn test_read_tlv_truncated() {
    assert!(read_tlv(&[0x83]).is_none());
    assert!(read_tlv(&[0x83, 0x05, 0x01]).is_none());
    assert!(read_tlv(&[0x89, 0x81]).is_none());
}

#[test]
fn test_binary_time_unix_epoch() {
    // 0x5A9BE400 and 0x65D14D80 seconds are past the disambiguation
    // threshold, so they count from 1970
    assert_eq!(
        decode_one(&tlv(TAG_BINARY_TIME, &[0x5A, 0x9B, 0xE4, 0x00])),
        Data::BinaryTime("2018-03-04T12:18:08Z".to_string())
    );
    assert_eq!(
        decode_one(&tlv(TAG_BINARY_TIME, &[0x65, 0xD1, 0x4D, 0x80])),
        Data::BinaryTime("2024-02-18T00:21:20Z".to_string())
    );
}

#[test]
fn test_binary_time_1984_epoch() {
    // 0x0BEBC200 = 200_000_000, below the threshold: counted from 1984
    assert_eq!(
        decode_one(&tlv(TAG_BINARY_TIME, &[0x0B, 0xEB, 0xC2, 0x00])),
        Data::BinaryTime("1990-05-03T19:33:20Z".to_string())
    );
}

#[test]
fn test_binary_time_fraction() {
    // 0x8000 / 65536 = exactly half a second
    assert_eq!(
        decode_one(&tlv(TAG_BINARY_TIME, &[0x5A, 0x9B, 0xE4, 0x00, 0x80, 0x00])),
        Data::BinaryTime("2018-03-04T12:18:08.500Z".to_string())
    );
}

#[test]
fn test_utc_time_shares_semantics() {
    assert_eq!(
        decode_one(&tlv(TAG_UTC_TIME, &[0x65, 0xD1, 0x4D, 0x80])),
        Data::UtcTime("2024-02-18T00:21:20Z".to_string())
    );
}

#[test]
fn test_time_invalid_falls_back_to_hex() {
    assert_eq!(
        decode_one(&tlv(TAG_BINARY_TIME, &[0x01, 0x02])),
        Data::BinaryTime("0102".to_string())
    );
    // seconds with the sign bit set are out of range
    assert_eq!(
        decode_one(&tlv(TAG_BINARY_TIME, &[0xFF, 0x00, 0x00, 0x00])),
        Data::BinaryTime("ff000000".to_string())
    );
}

#[test]
fn test_float_single_and_double() {
    assert_eq!(
        decode_one(&tlv(TAG_FLOATING_POINT, &[0x08, 0x3F, 0x80, 0x00, 0x00])),
        Data::Float(1.0)
    );
    // single-precision 0.1 carries noise past the 6th decimal
    assert_eq!(
        decode_one(&tlv(TAG_FLOATING_POINT, &[0x08, 0x3D, 0xCC, 0xCC, 0xCD])),
        Data::Float(0.1)
    );
    let mut double = vec![0x11];
    double.extend_from_slice(&2.5f64.to_be_bytes());
    assert_eq!(decode_one(&tlv(TAG_FLOATING_POINT, &double)), Data::Float(2.5));
}

#[test]
fn test_float_bad_length_is_unknown() {
    assert_eq!(
        decode_one(&tlv(TAG_FLOATING_POINT, &[0x08, 0x3F])),
        Data::Unknown(TAG_FLOATING_POINT, vec![0x08, 0x3F])
    );
}

#[test]
fn test_structure_recursion() {
    let content = [encode_boolean(true), encode_unsigned(42)].concat();
    assert_eq!(
        decode_one(&tlv(TAG_STRUCTURE, &content)),
        Data::Structure(vec![Data::Boolean(true), Data::Unsigned(42)])
    );
}

#[test]
fn test_unknown_tag_preserved() {
    assert_eq!(
        decode_one(&tlv(0x9F, &[0xAA, 0xBB])),
        Data::Unknown(0x9F, vec![0xAA, 0xBB])
    );
}

#[test]
fn test_sequence_stops_on_garbage() {
    let mut buf = encode_boolean(true);
    buf.extend_from_slice(&[0x85, 0x09]); // length runs past the buffer
    assert_eq!(decode_data_sequence(&buf), vec![Data::Boolean(true)]);
}
