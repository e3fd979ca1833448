// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! MMS PDU construction and inbound PDU classification
//!
//! Builds the three confirmed-request shapes a reports session needs
//! (Initiate, GetRCBValues, SetRCBValues per attribute) and recognises
//! what comes back: confirmed responses versus asynchronous
//! `informationReport` PDUs. The nesting below mirrors captured frames
//! byte for byte, field IEDs are unforgiving about it.

use super::ber;
use super::constant;

/// Confirmed-RequestPDU, also the generic `[0]` wrapper
const TAG_CONFIRMED_REQUEST: u8 = 0xA0;
/// Confirmed-ResponsePDU, also `[1]` objectName / variable-access-spec
const TAG_CONFIRMED_RESPONSE: u8 = 0xA1;
const TAG_INFORMATION_REPORT: u8 = 0xA3;
const TAG_READ: u8 = 0xA4;
const TAG_WRITE: u8 = 0xA5;
const TAG_INTEGER: u8 = 0x02;

/// Coarse shape of an inbound application PDU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PduKind {
    /// unconfirmed-PDU carrying an `informationReport`
    Report,
    /// response terminating a pending confirmed request
    ConfirmedResponse,
    /// anything else, including PDUs too mangled to classify
    Other,
}

/// The MMS InitiateRequest.
///
/// Replayed verbatim from a captured session; the blob already carries
/// its own session and presentation connect envelopes, so it goes out
/// without the data-transfer prefix.
pub fn encode_initiate() -> Vec<u8> {
    constant::INITIATE_REQUEST_TELEGRAM.to_vec()
}

// objectName: domain-specific, two IA5Strings back to back
fn domain_specific_name(domain_id: &str, item_id: &str) -> Vec<u8> {
    [ber::encode_ia5(domain_id), ber::encode_ia5(item_id)].concat()
}

// Wraps an operation body in the constant envelope shared by every
// confirmed request: prefix, [APPLICATION 1], SEQUENCE, MMS version 3,
// [0] wrapper, invoke-ID.
fn confirmed_request(invoke_id: u16, operation: &[u8]) -> Vec<u8> {
    let mut inner = vec![TAG_INTEGER, 0x02, (invoke_id >> 8) as u8, invoke_id as u8];
    inner.extend_from_slice(operation);

    let request = ber::tlv(TAG_CONFIRMED_REQUEST, &inner);
    let wrapper = ber::tlv(TAG_CONFIRMED_REQUEST, &request);

    let mut body = vec![TAG_INTEGER, 0x01, 0x03]; // MMS PDU version
    body.extend_from_slice(&wrapper);
    let sequence = ber::tlv(ber::TAG_SEQUENCE, &body);
    let application = ber::tlv(ber::TAG_MMS_PDU, &sequence);

    let mut pdu = constant::SESSION_PREFIX.to_vec();
    pdu.extend_from_slice(&application);
    pdu
}

/// GetRCBValues: a confirmed-RequestPDU `[read]` naming the RCB.
pub fn encode_get_rcb(domain_id: &str, item_id: &str, invoke_id: u16) -> Vec<u8> {
    let name = domain_specific_name(domain_id, item_id);
    let name = ber::tlv(TAG_CONFIRMED_RESPONSE, &name); // a1 name
    let name = ber::tlv(TAG_CONFIRMED_REQUEST, &name); // a0
    let name = ber::tlv(ber::TAG_SEQUENCE, &name); // 30, one list entry
    let name = ber::tlv(TAG_CONFIRMED_REQUEST, &name); // a0 listOfVariable
    let access = ber::tlv(TAG_CONFIRMED_RESPONSE, &name); // a1 variable-access-spec
    let operation = ber::tlv(TAG_READ, &access);
    confirmed_request(invoke_id, &operation)
}

/// SetRCBValues: a confirmed-RequestPDU `[write]` for one attribute.
///
/// The attribute is packed into the item as `item$Attribute` and `value`
/// is the raw BER encoding of the value to write.
pub fn encode_set_rcb_attribute(
    domain_id: &str,
    item_id: &str,
    attribute: &str,
    value: &[u8],
    invoke_id: u16,
) -> Vec<u8> {
    let full_item = if attribute.is_empty() {
        item_id.to_string()
    } else {
        format!("{}${}", item_id, attribute)
    };

    let name = domain_specific_name(domain_id, &full_item);
    let name = ber::tlv(TAG_CONFIRMED_RESPONSE, &name); // a1 name
    let name = ber::tlv(TAG_CONFIRMED_REQUEST, &name); // a0
    let name = ber::tlv(ber::TAG_SEQUENCE, &name); // 30, one list entry
    let name_block = ber::tlv(TAG_CONFIRMED_REQUEST, &name); // a0 listOfVariable

    let value_block = ber::tlv(TAG_CONFIRMED_REQUEST, value); // a0 listOfData

    let operation = ber::tlv(TAG_WRITE, &[name_block, value_block].concat());
    confirmed_request(invoke_id, &operation)
}

// Strips the session/presentation prefix when present.
fn application_pdu(pdu: &[u8]) -> &[u8] {
    if pdu.len() >= 4 && pdu[..4] == constant::SESSION_PREFIX {
        &pdu[4..]
    } else {
        pdu
    }
}

// Walks 61 / 30, skips the version INTEGER, and returns the CHOICE
// element that decides what the PDU is.
fn choice_element(pdu: &[u8]) -> Option<ber::Tlv> {
    let application = application_pdu(pdu);
    let (outer, _) = ber::read_tlv(application)?;
    if outer.tag != ber::TAG_MMS_PDU {
        return None;
    }
    let (sequence, _) = ber::read_tlv(outer.value)?;
    if sequence.tag != ber::TAG_SEQUENCE {
        return None;
    }

    let mut rest = sequence.value;
    if let Some((head, used)) = ber::read_tlv(rest) {
        if head.tag == TAG_INTEGER {
            rest = &rest[used..];
        }
    }
    let (choice, _) = ber::read_tlv(rest)?;
    Some(choice)
}

/// Content of the `[3] informationReport` element, when `pdu` is an
/// unconfirmed-PDU carrying one.
pub fn information_report_body(pdu: &[u8]) -> Option<&[u8]> {
    let choice = choice_element(pdu)?;
    if choice.tag != TAG_CONFIRMED_REQUEST {
        return None;
    }
    let (report, _) = ber::read_tlv(choice.value)?;
    if report.tag != TAG_INFORMATION_REPORT {
        return None;
    }
    Some(report.value)
}

/// Classifies an inbound application PDU without decoding it.
pub fn classify(pdu: &[u8]) -> PduKind {
    match choice_element(pdu) {
        Some(choice) if choice.tag == TAG_CONFIRMED_RESPONSE => PduKind::ConfirmedResponse,
        Some(_) if information_report_body(pdu).is_some() => PduKind::Report,
        _ => PduKind::Other,
    }
}

#[cfg(test)]
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
const DOMAIN: &str = "VMC7_1LD0";
#[cfg(test)]
const ITEM: &str = "LLN0$BR$CB_LDPHAS1_CYPO02";

#[test]
fn test_get_rcb_exact_frame() {
    // reference frame from a working capture, invoke-ID 0x012C
    let expected = "01000100613f303d020103a038a0360202012ca430a12ea02c302aa028a126\
                    1a09564d43375f314c44301a194c4c4e302442522443425f4c4450484153315f4359504f3032";
    let pdu = encode_get_rcb(DOMAIN, ITEM, 0x012C);
    assert_eq!(ber::hex_str(&pdu), expected);
}

#[test]
fn test_get_rcb_shape() {
    let pdu = encode_get_rcb(DOMAIN, ITEM, 0x012C);
    assert_eq!(&pdu[..4], &constant::SESSION_PREFIX);
    assert_eq!(pdu[4], ber::TAG_MMS_PDU);
    assert!(contains(&pdu, &[0x02, 0x01, 0x03]));
    assert!(contains(&pdu, &[0x02, 0x02, 0x01, 0x2C]));
    assert!(contains(&pdu, &ber::encode_ia5(DOMAIN)));
    assert!(contains(&pdu, &ber::encode_ia5(ITEM)));
}

#[test]
fn test_set_rcb_rpt_ena_value_block() {
    let pdu = encode_set_rcb_attribute(DOMAIN, ITEM, "RptEna", &ber::encode_boolean(true), 0x012C);
    let expected = "0100010061493047020103a042a0400202012ca53aa0333031a02fa12d\
                    1a09564d43375f314c44301a204c4c4e302442522443425f4c4450484153315f4359504f3032\
                    24527074456e61a003830101";
    assert_eq!(ber::hex_str(&pdu), expected);
    assert!(contains(&pdu, &[0xA0, 0x03, 0x83, 0x01, 0x01]));
    assert!(contains(&pdu, &ber::encode_ia5("LLN0$BR$CB_LDPHAS1_CYPO02$RptEna")));
}

#[test]
fn test_set_rcb_intg_pd_value_block() {
    let pdu = encode_set_rcb_attribute(DOMAIN, ITEM, "IntgPd", &ber::encode_unsigned(2000), 0x012C);
    assert!(contains(&pdu, &[0xA0, 0x04, 0x86, 0x02, 0x07, 0xD0]));
}

#[test]
fn test_classify_response() {
    let mut inner = vec![0x02, 0x02, 0x01, 0x2C];
    inner.extend(ber::tlv(TAG_WRITE, &[]));
    let choice = ber::tlv(TAG_CONFIRMED_RESPONSE, &inner);
    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(choice);
    let sequence = ber::tlv(ber::TAG_SEQUENCE, &body);
    let application = ber::tlv(ber::TAG_MMS_PDU, &sequence);
    let pdu = [constant::SESSION_PREFIX.to_vec(), application].concat();

    assert_eq!(classify(&pdu), PduKind::ConfirmedResponse);
}

#[test]
fn test_classify_report() {
    let report = ber::tlv(TAG_INFORMATION_REPORT, &ber::tlv(0x80, b"RPT"));
    let unconfirmed = ber::tlv(TAG_CONFIRMED_REQUEST, &report);
    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(unconfirmed);
    let sequence = ber::tlv(ber::TAG_SEQUENCE, &body);
    let application = ber::tlv(ber::TAG_MMS_PDU, &sequence);
    let pdu = [constant::SESSION_PREFIX.to_vec(), application].concat();

    assert_eq!(classify(&pdu), PduKind::Report);
    assert!(information_report_body(&pdu).is_some());
}

#[test]
fn test_classify_garbage() {
    assert_eq!(classify(&[]), PduKind::Other);
    assert_eq!(classify(&[0x01, 0x00, 0x01, 0x00]), PduKind::Other);
    assert_eq!(classify(&[0xDE, 0xAD, 0xBE, 0xEF, 0xAA]), PduKind::Other);
}

#[test]
fn test_requests_are_not_responses() {
    let pdu = encode_get_rcb(DOMAIN, ITEM, 0x012C);
    assert_eq!(classify(&pdu), PduKind::Other);
}
