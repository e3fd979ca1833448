// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Wire constants shared by the MMS layers

/// default ISO-on-TCP port
pub const ISO_TCP_PORT: u16 = 102;

/// Session/Presentation prefix carried in front of every MMS application
/// PDU exchanged after the Initiate (Give-Tokens + Data-Transfer SPDUs)
pub const SESSION_PREFIX: [u8; 4] = [0x01, 0x00, 0x01, 0x00];

/// first invoke-ID issued on a fresh session, aligned on captured traces
pub const INVOKE_ID_BASE: u16 = 0x012C;

/// MMS InitiateRequest telegram, replayed verbatim from a working capture.
/// The blob carries its own Session CONNECT, Presentation CP and ACSE AARQ
/// envelopes and is therefore sent without [`SESSION_PREFIX`].
pub const INITIATE_REQUEST_TELEGRAM: [u8; 180] = [
    0x0d, 0xb2, 0x05, 0x06, 0x13, 0x01, 0x00, 0x16, 0x01, 0x02, 0x14, 0x02,
    0x00, 0x02, 0x33, 0x02, 0x00, 0x01, 0x34, 0x02, 0x00, 0x01, 0xc1, 0x9c,
    0x31, 0x81, 0x99, 0xa0, 0x03, 0x80, 0x01, 0x01, 0xa2, 0x81, 0x91, 0x81,
    0x04, 0x00, 0x00, 0x00, 0x01, 0x82, 0x04, 0x00, 0x00, 0x00, 0x01, 0xa4,
    0x23, 0x30, 0x0f, 0x02, 0x01, 0x01, 0x06, 0x04, 0x52, 0x01, 0x00, 0x01,
    0x30, 0x04, 0x06, 0x02, 0x51, 0x01, 0x30, 0x10, 0x02, 0x01, 0x03, 0x06,
    0x05, 0x28, 0xca, 0x22, 0x02, 0x01, 0x30, 0x04, 0x06, 0x02, 0x51, 0x01,
    0x61, 0x5e, 0x30, 0x5c, 0x02, 0x01, 0x01, 0xa0, 0x57, 0x60, 0x55, 0xa1,
    0x07, 0x06, 0x05, 0x28, 0xca, 0x22, 0x02, 0x03, 0xa2, 0x07, 0x06, 0x05,
    0x29, 0x01, 0x87, 0x67, 0x01, 0xa3, 0x03, 0x02, 0x01, 0x0c, 0xa6, 0x06,
    0x06, 0x04, 0x29, 0x01, 0x87, 0x67, 0xa7, 0x03, 0x02, 0x01, 0x0c, 0xbe,
    0x2f, 0x28, 0x2d, 0x02, 0x01, 0x03, 0xa0, 0x28, 0xa8, 0x26, 0x80, 0x03,
    0x00, 0xfd, 0xe8, 0x81, 0x01, 0x05, 0x82, 0x01, 0x05, 0x83, 0x01, 0x0a,
    0xa4, 0x16, 0x80, 0x01, 0x01, 0x81, 0x03, 0x05, 0xf1, 0x00, 0x82, 0x0c,
    0x03, 0xee, 0x1c, 0x00, 0x00, 0x04, 0x08, 0x00, 0x00, 0x79, 0xef, 0x18,
];

// RCB attribute defaults observed in the traces that work
pub const DEFAULT_RESV_TMS: u32 = 5;
pub const DEFAULT_INTG_PD_MS: u32 = 2000;
/// trigger options, first byte is the BER bit-string padding indicator
pub const DEFAULT_TRG_OPS: [u8; 2] = [0x02, 0x0c];
/// optional fields, first byte is the BER bit-string padding indicator
pub const DEFAULT_OPT_FLDS: [u8; 3] = [0x06, 0x7b, 0x00];
pub const DEFAULT_ENTRY_ID: [u8; 8] = [0; 8];

/// seconds between 1970-01-01 and the IEC 61850 binary-time epoch 1984-01-01
pub const EPOCH_1984_OFFSET_SECS: i64 = 441_763_200;

/// seconds values at or above this are counted from the UNIX epoch,
/// below it from 1984 (the two ranges stopped overlapping around 2001)
pub const EPOCH_DISAMBIGUATION_SECS: u32 = 1_000_000_000;
