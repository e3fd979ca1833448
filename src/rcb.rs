// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Report control block addressing and activation settings

use super::ber;
use super::constant;
use super::error::Error;
use std::fmt;
use std::str::FromStr;

/// Address of a report control block on the IED: the MMS domain (the
/// logical device) and the item path inside it, e.g.
/// `VMC7_1LD0` / `LLN0$BR$CB_LDPHAS1_CYPO02`.
#[derive(Debug, Clone, PartialEq)]
pub struct RcbReference {
    pub domain_id: String,
    pub item_id: String,
}

impl RcbReference {
    pub fn new(domain_id: &str, item_id: &str) -> RcbReference {
        RcbReference {
            domain_id: domain_id.to_string(),
            item_id: item_id.to_string(),
        }
    }
}

impl fmt::Display for RcbReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.domain_id, self.item_id)
    }
}

impl FromStr for RcbReference {
    type Err = Error;

    /// Parses the `DOMAIN/ITEM` form used on the wire and in SCL tooling,
    /// e.g. `VMC7_1LD0/LLN0$BR$CB_LDPHAS1_CYPO02`.
    fn from_str(s: &str) -> Result<RcbReference, Error> {
        match s.split_once('/') {
            Some((domain_id, item_id)) if !domain_id.is_empty() && !item_id.is_empty() => {
                Ok(RcbReference::new(domain_id, item_id))
            }
            _ => Err(Error::InvalidReference(s.to_string())),
        }
    }
}

/// Attribute values written while activating reporting on an RCB.
///
/// The defaults reproduce the captured sequence that field IEDs accept.
/// `trg_ops` and `opt_flds` carry the BER bit-string padding indicator
/// in their first byte; check them against the target IED's flags.
#[derive(Debug, Clone)]
pub struct RcbSettings {
    pub resv_tms: u32,
    /// integrity period in milliseconds
    pub intg_pd_ms: u32,
    pub trg_ops: Vec<u8>,
    pub opt_flds: Vec<u8>,
    pub purge_buf: bool,
    pub entry_id: Vec<u8>,
    pub rpt_ena: bool,
    /// request a general interrogation once reporting is on
    pub gi: bool,
    /// probe the RCB with GetRCBValues before writing
    pub read_before_write: bool,
}

impl Default for RcbSettings {
    fn default() -> RcbSettings {
        RcbSettings {
            resv_tms: constant::DEFAULT_RESV_TMS,
            intg_pd_ms: constant::DEFAULT_INTG_PD_MS,
            trg_ops: constant::DEFAULT_TRG_OPS.to_vec(),
            opt_flds: constant::DEFAULT_OPT_FLDS.to_vec(),
            purge_buf: true,
            entry_id: constant::DEFAULT_ENTRY_ID.to_vec(),
            rpt_ena: true,
            gi: true,
            read_before_write: true,
        }
    }
}

/// The canonical activation sequence, one write per attribute.
///
/// The order is load-bearing: some IEDs reject `RptEna` unless the
/// earlier attributes were written first, and a write landing after
/// `RptEna` other than `GI` can disable reporting again.
pub(crate) fn attribute_writes(settings: &RcbSettings) -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("ResvTms", ber::encode_unsigned(settings.resv_tms)),
        ("IntgPd", ber::encode_unsigned(settings.intg_pd_ms)),
        ("TrgOps", ber::encode_bit_string(&settings.trg_ops)),
        ("OptFlds", ber::encode_bit_string(&settings.opt_flds)),
        ("PurgeBuf", ber::encode_boolean(settings.purge_buf)),
        ("EntryID", ber::encode_octet_string(&settings.entry_id)),
        ("RptEna", ber::encode_boolean(settings.rpt_ena)),
        ("GI", ber::encode_boolean(settings.gi)),
    ]
}

#[test]
fn test_write_order() {
    let writes = attribute_writes(&RcbSettings::default());
    let order: Vec<&str> = writes.iter().map(|(attr, _)| *attr).collect();
    assert_eq!(
        order,
        [
            "ResvTms", "IntgPd", "TrgOps", "OptFlds", "PurgeBuf", "EntryID", "RptEna", "GI",
        ]
    );
}

#[test]
fn test_default_values_encode() {
    let writes = attribute_writes(&RcbSettings::default());
    assert_eq!(writes[0].1, vec![0x85, 0x01, 0x05]); // ResvTms 5
    assert_eq!(writes[1].1, vec![0x86, 0x02, 0x07, 0xD0]); // IntgPd 2000
    assert_eq!(writes[2].1, vec![0x84, 0x02, 0x02, 0x0C]); // TrgOps
    assert_eq!(writes[3].1, vec![0x84, 0x03, 0x06, 0x7B, 0x00]); // OptFlds
    assert_eq!(writes[6].1, vec![0x83, 0x01, 0x01]); // RptEna true
}

#[test]
fn test_reference_parse() {
    let rcb: RcbReference = "VMC7_1LD0/LLN0$BR$CB_LDPHAS1_CYPO02".parse().unwrap();
    assert_eq!(rcb.domain_id, "VMC7_1LD0");
    assert_eq!(rcb.item_id, "LLN0$BR$CB_LDPHAS1_CYPO02");
    assert_eq!(rcb.to_string(), "VMC7_1LD0/LLN0$BR$CB_LDPHAS1_CYPO02");
}

#[test]
fn test_reference_parse_rejects_bad_input() {
    assert!("no-separator".parse::<RcbReference>().is_err());
    assert!("/item".parse::<RcbReference>().is_err());
    assert!("domain/".parse::<RcbReference>().is_err());
}
