// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! COTP (ISO 8073 Class 0) transport, client side only
//!
//! Implements the CR/CC handshake and DT data transfer needed to carry
//! MMS over TPKT. Class 0 is unsegmented here: each DT TPDU is one
//! self-contained ISO payload, the TPKT length carries the size.

use super::error::Error;
use super::tpkt;
use log::trace;
use std::io::{Read, Write};

/// Connection Request
pub const CR_TPDU: u8 = 0xE0;
/// Connection Confirm
pub const CC_TPDU: u8 = 0xD0;
/// Data
pub const DT_TPDU: u8 = 0xF0;

/// COTP connection parameters.
///
/// The defaults reproduce the captured handshake that field IEDs accept:
/// TPDU size code `0x0A` (1024 octets) and both TSAPs `0x0001`.
#[derive(Debug, Clone)]
pub struct Options {
    pub src_ref: u16,
    pub dst_ref: u16,
    pub tpdu_size: u8,
    pub called_tsap: u16,
    pub calling_tsap: u16,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            src_ref: 0x0001,
            dst_ref: 0x0000,
            tpdu_size: 0x0A,
            called_tsap: 0x0001,
            calling_tsap: 0x0001,
        }
    }
}

// CR TPDU: LI, type, dst_ref, src_ref, class/options, then the TPDU size,
// Called TSAP and Calling TSAP parameters. LI excludes itself.
fn build_cr(options: &Options) -> [u8; 18] {
    [
        0x11,
        CR_TPDU,
        (options.dst_ref >> 8) as u8,
        options.dst_ref as u8,
        (options.src_ref >> 8) as u8,
        options.src_ref as u8,
        0x00, // class 0, no options
        0xC0,
        0x01,
        options.tpdu_size,
        0xC2,
        0x02,
        (options.called_tsap >> 8) as u8,
        options.called_tsap as u8,
        0xC1,
        0x02,
        (options.calling_tsap >> 8) as u8,
        options.calling_tsap as u8,
    ]
}

fn check_cc(tpdu: &[u8]) -> Result<(), Error> {
    if tpdu.len() < 7 {
        return Err(Error::Cotp(format!("CC TPDU too short: {} bytes", tpdu.len())));
    }
    if tpdu[1] != CC_TPDU {
        return Err(Error::Cotp(format!(
            "unexpected TPDU type {:#04x}, expected CC",
            tpdu[1]
        )));
    }
    // extra options are tolerated, an LI pointing past the TPDU is not
    let li = tpdu[0] as usize;
    if li + 1 > tpdu.len() {
        return Err(Error::Cotp(format!(
            "inconsistent CC length: LI={}, TPDU is {} bytes",
            li,
            tpdu.len()
        )));
    }
    Ok(())
}

/// Runs the CR/CC handshake on an already-open byte stream.
pub fn connect<S: Read + Write>(stream: &mut S, options: &Options) -> Result<(), Error> {
    tpkt::send(stream, &build_cr(options))?;

    let tpdu = match tpkt::recv(stream)? {
        Some(tpdu) => tpdu,
        None => return Err(Error::Cotp("connection closed while waiting for CC".to_string())),
    };
    check_cc(&tpdu)
}

/// Wraps `user_data` in a DT TPDU and sends it.
///
/// The LI only covers the COTP bytes themselves (type + control), the
/// TPKT length already carries the user data size.
pub fn send_data<S: Write>(stream: &mut S, user_data: &[u8]) -> Result<(), Error> {
    let mut tpdu = Vec::with_capacity(3 + user_data.len());
    tpdu.extend_from_slice(&[0x02, DT_TPDU, 0x80]);
    tpdu.extend_from_slice(user_data);
    tpkt::send(stream, &tpdu)
}

/// Reads the next DT TPDU and returns its user data.
///
/// Non-DT TPDUs (CR, CC, DR, ...) are skipped. `Ok(None)` is a clean EOF.
pub fn recv_data<S: Read>(stream: &mut S) -> Result<Option<Vec<u8>>, Error> {
    loop {
        let tpdu = match tpkt::recv(stream)? {
            Some(tpdu) => tpdu,
            None => return Ok(None),
        };
        if tpdu.len() < 3 {
            return Err(Error::Cotp(format!("TPDU too short: {} bytes", tpdu.len())));
        }

        let li = tpdu[0] as usize;
        if tpdu[1] == DT_TPDU {
            if li + 1 > tpdu.len() {
                return Err(Error::Cotp(format!(
                    "inconsistent DT length: LI={}, TPDU is {} bytes",
                    li,
                    tpdu.len()
                )));
            }
            return Ok(Some(tpdu[3..].to_vec()));
        }
        trace!("skipping TPDU of type {:#04x}", tpdu[1]);
    }
}

#[cfg(test)]
use std::io::Cursor;

#[cfg(test)]
struct TwoWay {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

#[cfg(test)]
impl Read for TwoWay {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

#[cfg(test)]
impl Write for TwoWay {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_build_cr_default() {
    let cr = build_cr(&Options::default());
    assert_eq!(
        cr,
        [
            0x11, 0xE0, 0x00, 0x00, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A, 0xC2, 0x02, 0x00, 0x01,
            0xC1, 0x02, 0x00, 0x01,
        ]
    );
}

#[test]
fn test_connect_handshake() {
    // minimal CC: LI=6, type 0xD0, dst/src refs, class 0
    let cc = vec![0x06, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00];
    let mut wire = Vec::new();
    tpkt::send(&mut wire, &cc).unwrap();

    let mut stream = TwoWay {
        input: Cursor::new(wire),
        output: Vec::new(),
    };
    connect(&mut stream, &Options::default()).unwrap();

    // the CR went out framed in a single TPKT
    assert_eq!(&stream.output[..4], &[0x03, 0x00, 0x00, 0x16]);
    assert_eq!(stream.output[4], 0x11);
    assert_eq!(stream.output[5], CR_TPDU);
}

#[test]
fn test_connect_rejects_non_cc() {
    let dr = vec![0x06, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00];
    let mut wire = Vec::new();
    tpkt::send(&mut wire, &dr).unwrap();

    let mut stream = TwoWay {
        input: Cursor::new(wire),
        output: Vec::new(),
    };
    match connect(&mut stream, &Options::default()) {
        Err(Error::Cotp(_)) => {}
        other => panic!("expected COTP error, got {:?}", other),
    }
}

#[test]
fn test_send_data_frame() {
    let mut out = Vec::new();
    send_data(&mut out, &[0xDE, 0xAD]).unwrap();
    assert_eq!(out, vec![0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x80, 0xDE, 0xAD]);
}

#[test]
fn test_recv_data_skips_non_dt() {
    let mut wire = Vec::new();
    tpkt::send(&mut wire, &[0x06, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00]).unwrap();
    tpkt::send(&mut wire, &[0x02, 0xF0, 0x80, 0x01, 0x02, 0x03]).unwrap();

    let got = recv_data(&mut Cursor::new(wire)).unwrap();
    assert_eq!(got, Some(vec![0x01, 0x02, 0x03]));
}

#[test]
fn test_recv_data_eof() {
    let got = recv_data(&mut Cursor::new(Vec::new())).unwrap();
    assert_eq!(got, None);
}
