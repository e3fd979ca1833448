// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! TPKT (RFC 1006) framing of ISO payloads over a byte stream
//!
//! Every ISO payload (COTP, ACSE, MMS) travels inside a 4 byte header
//! `03 00 len_hi len_lo` where the length covers the header itself.

use super::error::Error;
use byteorder::{BigEndian, ByteOrder};
use std::io::{Read, Write};

pub const VERSION: u8 = 0x03;
pub const HEADER_LEN: usize = 4;

/// largest payload the 16 bit length field can carry
pub const MAX_PAYLOAD: usize = 0xFFFF - HEADER_LEN;

/// Frames `payload` in a TPKT header and writes the whole frame.
pub fn send<S: Write>(stream: &mut S, payload: &[u8]) -> Result<(), Error> {
    if payload.len() > MAX_PAYLOAD {
        return Err(Error::Overflow(payload.len()));
    }

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&[VERSION, 0x00, 0x00, 0x00]);
    BigEndian::write_u16(&mut frame[2..4], (HEADER_LEN + payload.len()) as u16);
    frame.extend_from_slice(payload);
    stream.write_all(&frame)?;
    Ok(())
}

/// Reads one complete TPKT frame and returns its payload.
///
/// `Ok(None)` means the peer closed the connection before the next header.
/// A connection that dies once the header started is a framing error, not
/// EOF: the remaining bytes of the frame can never arrive.
pub fn recv<S: Read>(stream: &mut S) -> Result<Option<Vec<u8>>, Error> {
    let mut header = [0u8; HEADER_LEN];
    match read_full(stream, &mut header)? {
        0 => return Ok(None),
        n if n < HEADER_LEN => {
            return Err(Error::Framing(format!(
                "header cut short after {} bytes",
                n
            )))
        }
        _ => {}
    }

    if header[0] != VERSION {
        return Err(Error::Framing(format!("unexpected version {:#04x}", header[0])));
    }
    if header[1] != 0x00 {
        return Err(Error::Framing(format!(
            "unexpected reserved byte {:#04x}",
            header[1]
        )));
    }

    let length = BigEndian::read_u16(&header[2..]) as usize;
    if length < HEADER_LEN {
        return Err(Error::Framing(format!("invalid length {}", length)));
    }

    let mut payload = vec![0u8; length - HEADER_LEN];
    let wanted = payload.len();
    if wanted > 0 {
        let got = read_full(stream, &mut payload)?;
        if got < wanted {
            return Err(Error::Framing(format!(
                "truncated payload: expected {} bytes, got {}",
                wanted, got
            )));
        }
    }
    Ok(Some(payload))
}

// Reads until buf is full or the stream hits EOF, returning the byte count.
// Read timeouts bubble up as Error::Timeout through the From impl.
fn read_full<S: Read>(stream: &mut S, buf: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
use std::io::Cursor;

#[test]
fn test_send_header() {
    let mut out = Vec::new();
    send(&mut out, &[0xAA, 0xBB, 0xCC]).unwrap();
    assert_eq!(out, vec![0x03, 0x00, 0x00, 0x07, 0xAA, 0xBB, 0xCC]);
}

#[test]
fn test_roundtrip() {
    for payload in [vec![], vec![0x42], vec![0x55; 300]] {
        let mut wire = Vec::new();
        send(&mut wire, &payload).unwrap();
        assert_eq!(wire[2] as usize * 256 + wire[3] as usize, 4 + payload.len());
        let got = recv(&mut Cursor::new(wire)).unwrap();
        assert_eq!(got, Some(payload));
    }
}

#[test]
fn test_recv_eof() {
    let got = recv(&mut Cursor::new(Vec::new())).unwrap();
    assert_eq!(got, None);
}

#[test]
fn test_recv_short_header() {
    match recv(&mut Cursor::new(vec![0x03, 0x00])) {
        Err(Error::Framing(_)) => {}
        other => panic!("expected framing error, got {:?}", other),
    }
}

#[test]
fn test_recv_bad_version() {
    match recv(&mut Cursor::new(vec![0x04, 0x00, 0x00, 0x04])) {
        Err(Error::Framing(_)) => {}
        other => panic!("expected framing error, got {:?}", other),
    }
}

#[test]
fn test_recv_truncated_payload() {
    match recv(&mut Cursor::new(vec![0x03, 0x00, 0x00, 0x08, 0x01, 0x02])) {
        Err(Error::Framing(_)) => {}
        other => panic!("expected framing error, got {:?}", other),
    }
}

#[test]
fn test_send_overflow() {
    let mut out = Vec::new();
    match send(&mut out, &vec![0u8; MAX_PAYLOAD + 1]) {
        Err(Error::Overflow(len)) => assert_eq!(len, MAX_PAYLOAD + 1),
        other => panic!("expected overflow error, got {:?}", other),
    }
}
