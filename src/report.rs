// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Decoding of `informationReport` PDUs into [`MmsReport`]
//!
//! A report is a flat list of access results whose first eight positions
//! carry the report header fields in the IEC 61850 order; everything
//! after that is data-set member values. Decoding degrades instead of
//! failing: a PDU the decoder cannot walk still produces a report, with
//! the raw bytes as its only entry.

use super::ber::{self, Data};
use super::mms;
use log::warn;

// positions of the header fields in the access-result list
const POS_RPT_ID: usize = 0;
const POS_SEQ_NUM: usize = 2;
const POS_TIME_OF_ENTRY: usize = 3;
const POS_DAT_SET: usize = 4;
const POS_BUF_OVFL: usize = 5;

/// index of the first data-set member entry; positions before it are
/// RptID, OptFlds, SeqNum, TimeOfEntry, DatSet, BufOvfl, EntryID and
/// the inclusion bit-string
pub const FIRST_MEMBER_POS: usize = 8;

/// One element of a `listOfAccessResult`.
///
/// Only the success alternative is decoded today; the enum leaves room
/// for the failure alternative (DataAccessError) without breaking
/// matches on `Success`.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessResult {
    Success(Data),
}

impl AccessResult {
    pub fn value(&self) -> &Data {
        match self {
            AccessResult::Success(data) => data,
        }
    }
}

/// A decoded `informationReport`.
#[derive(Debug, Clone)]
pub struct MmsReport {
    pub rpt_id: Option<String>,
    pub data_set_name: Option<String>,
    pub seq_num: Option<u32>,
    /// ISO-8601 UTC timestamp of the report entry
    pub time_of_entry: Option<String>,
    pub buf_ovfl: Option<bool>,
    /// every decoded access result, header fields included
    pub entries: Vec<AccessResult>,
    /// the PDU the report was decoded from, for diagnostics
    pub raw_pdu: Vec<u8>,
}

impl MmsReport {
    /// The data-set member entries, without the header fields.
    pub fn members(&self) -> &[AccessResult] {
        self.entries.get(FIRST_MEMBER_POS..).unwrap_or(&[])
    }

    fn from_entries(values: Vec<Data>, pdu: &[u8]) -> MmsReport {
        let mut report = MmsReport {
            rpt_id: None,
            data_set_name: None,
            seq_num: None,
            time_of_entry: None,
            buf_ovfl: None,
            entries: Vec::new(),
            raw_pdu: pdu.to_vec(),
        };

        for (pos, value) in values.iter().enumerate() {
            match (pos, value) {
                (POS_RPT_ID, Data::VisibleString(s)) => report.rpt_id = Some(s.clone()),
                (POS_SEQ_NUM, Data::Unsigned(n)) => report.seq_num = Some(*n as u32),
                (POS_TIME_OF_ENTRY, Data::BinaryTime(t))
                | (POS_TIME_OF_ENTRY, Data::UtcTime(t)) => {
                    report.time_of_entry = Some(t.clone())
                }
                (POS_DAT_SET, Data::VisibleString(s)) => report.data_set_name = Some(s.clone()),
                (POS_BUF_OVFL, Data::Boolean(b)) => report.buf_ovfl = Some(*b),
                _ => {}
            }
        }

        report.entries = values.into_iter().map(AccessResult::Success).collect();
        report
    }

    fn undecoded(pdu: &[u8]) -> MmsReport {
        let tag = pdu.first().copied().unwrap_or(0);
        MmsReport {
            rpt_id: None,
            data_set_name: None,
            seq_num: None,
            time_of_entry: None,
            buf_ovfl: None,
            entries: vec![AccessResult::Success(Data::Unknown(tag, pdu.to_vec()))],
            raw_pdu: pdu.to_vec(),
        }
    }
}

/// Decodes a report PDU, degrading to the raw bytes when the envelope
/// does not parse.
pub fn decode(pdu: &[u8]) -> MmsReport {
    match try_decode(pdu) {
        Some(report) => report,
        None => {
            warn!(
                "report PDU of {} bytes did not decode, keeping raw bytes",
                pdu.len()
            );
            MmsReport::undecoded(pdu)
        }
    }
}

// Inside the informationReport: a variable-access-specification (the a1
// variableListName, usually "RPT") followed by the a0 listOfAccessResult.
fn try_decode(pdu: &[u8]) -> Option<MmsReport> {
    let body = mms::information_report_body(pdu)?;

    let mut rest = body;
    let (head, used) = ber::read_tlv(rest)?;
    let list = if head.tag == 0xA1 {
        rest = &rest[used..];
        let (list, _) = ber::read_tlv(rest)?;
        list
    } else {
        head
    };
    if list.tag != 0xA0 {
        return None;
    }

    Some(MmsReport::from_entries(
        ber::decode_data_sequence(list.value),
        pdu,
    ))
}

#[cfg(test)]
use super::constant;

#[cfg(test)]
pub(crate) fn sample_report_pdu() -> Vec<u8> {
    let mut list = Vec::new();
    list.extend(ber::tlv(0x8A, b"LDPHAS1_CYPO02")); // RptID
    list.extend(ber::encode_bit_string(&[0x06, 0x7B, 0x00])); // OptFlds
    list.extend(ber::encode_unsigned(7)); // SeqNum
    list.extend(ber::tlv(0x8C, &[0x5A, 0x9B, 0xE4, 0x00, 0x00, 0x00])); // TimeOfEntry
    list.extend(ber::tlv(0x8A, b"VMC7_1LD0/LLN0$DS_LDPHAS1")); // DatSet
    list.extend(ber::encode_boolean(false)); // BufOvfl
    list.extend(ber::encode_octet_string(&[0; 8])); // EntryID
    list.extend(ber::encode_bit_string(&[0x06, 0xC0])); // Inclusion

    // two members: float value + quality, unsigned value + quality
    let member = [
        ber::tlv(0x87, &[0x08, 0x3F, 0x80, 0x00, 0x00]),
        ber::encode_bit_string(&[0x03, 0x00, 0x00]),
    ]
    .concat();
    list.extend(ber::tlv(0xA2, &member));
    let member = [
        ber::encode_unsigned(42),
        ber::encode_bit_string(&[0x03, 0x00, 0x00]),
    ]
    .concat();
    list.extend(ber::tlv(0xA2, &member));

    let list = ber::tlv(0xA0, &list);
    let name = ber::tlv(0xA1, &ber::tlv(0x80, b"RPT"));
    let report = ber::tlv(0xA3, &[name, list].concat());
    let unconfirmed = ber::tlv(0xA0, &report);

    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(unconfirmed);
    let sequence = ber::tlv(ber::TAG_SEQUENCE, &body);
    let application = ber::tlv(ber::TAG_MMS_PDU, &sequence);
    [constant::SESSION_PREFIX.to_vec(), application].concat()
}

#[test]
fn test_decode_sample_report() {
    let pdu = sample_report_pdu();
    let report = decode(&pdu);

    assert_eq!(report.rpt_id.as_deref(), Some("LDPHAS1_CYPO02"));
    assert_eq!(report.seq_num, Some(7));
    assert_eq!(
        report.time_of_entry.as_deref(),
        Some("2018-03-04T12:18:08.000Z")
    );
    assert_eq!(
        report.data_set_name.as_deref(),
        Some("VMC7_1LD0/LLN0$DS_LDPHAS1")
    );
    assert_eq!(report.buf_ovfl, Some(false));
    assert_eq!(report.entries.len(), 10);
    assert_eq!(report.raw_pdu, pdu);

    let members = report.members();
    assert_eq!(members.len(), 2);
    match members[0].value() {
        Data::Structure(items) => assert_eq!(items[0], Data::Float(1.0)),
        other => panic!("expected structure, got {:?}", other),
    }
    match members[1].value() {
        Data::Structure(items) => assert_eq!(items[0], Data::Unsigned(42)),
        other => panic!("expected structure, got {:?}", other),
    }
}

#[test]
fn test_decode_degrades_to_raw() {
    let garbage = [0xDE, 0xAD, 0xBE, 0xEF];
    let report = decode(&garbage);

    assert_eq!(report.rpt_id, None);
    assert_eq!(report.seq_num, None);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(
        report.entries[0].value(),
        &Data::Unknown(0xDE, garbage.to_vec())
    );
    assert_eq!(report.raw_pdu, garbage);
}

#[test]
fn test_decode_without_list_name() {
    // some stacks omit the variableListName; the list is then first
    let mut list = Vec::new();
    list.extend(ber::tlv(0x8A, b"RPT1"));
    let list = ber::tlv(0xA0, &list);
    let report_body = ber::tlv(0xA3, &list);
    let unconfirmed = ber::tlv(0xA0, &report_body);
    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(unconfirmed);
    let sequence = ber::tlv(ber::TAG_SEQUENCE, &body);
    let application = ber::tlv(ber::TAG_MMS_PDU, &sequence);
    let pdu = [constant::SESSION_PREFIX.to_vec(), application].concat();

    let report = decode(&pdu);
    assert_eq!(report.rpt_id.as_deref(), Some("RPT1"));
}

#[test]
fn test_header_fields_with_wrong_types_stay_in_entries() {
    // a report whose SeqNum slot holds a string still decodes, the
    // typed accessor just stays empty
    let mut list = Vec::new();
    list.extend(ber::tlv(0x8A, b"RPT1"));
    list.extend(ber::encode_bit_string(&[0x06, 0x7B, 0x00]));
    list.extend(ber::tlv(0x8A, b"not-a-number"));
    let list = ber::tlv(0xA0, &list);
    let report_body = ber::tlv(0xA3, &list);
    let unconfirmed = ber::tlv(0xA0, &report_body);
    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(unconfirmed);
    let sequence = ber::tlv(ber::TAG_SEQUENCE, &body);
    let application = ber::tlv(ber::TAG_MMS_PDU, &sequence);
    let pdu = [constant::SESSION_PREFIX.to_vec(), application].concat();

    let report = decode(&pdu);
    assert_eq!(report.rpt_id.as_deref(), Some("RPT1"));
    assert_eq!(report.seq_num, None);
    assert_eq!(report.entries.len(), 3);
}
