extern crate mms61850;
use mms61850::ber;
use mms61850::client::Client;
use mms61850::cotp;
use mms61850::error::Error;
use mms61850::rcb::{RcbReference, RcbSettings};
use mms61850::tpkt;
use std::cell::RefCell;
use std::io::{Cursor, Read, Write};
use std::rc::Rc;

const PREFIX: [u8; 4] = [0x01, 0x00, 0x01, 0x00];

// A scripted peer: the client reads the pre-recorded inbound bytes in
// order and everything it writes lands in a shared buffer for
// inspection. The MMS exchanges are lock-step, so a fully pre-recorded
// stream is enough.
struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    output: Rc<RefCell<Vec<u8>>>,
}

impl ScriptedStream {
    fn new(script: Vec<u8>) -> (ScriptedStream, Rc<RefCell<Vec<u8>>>) {
        let output = Rc::new(RefCell::new(Vec::new()));
        let stream = ScriptedStream {
            input: Cursor::new(script),
            output: output.clone(),
        };
        (stream, output)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.output.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn frame_cc(script: &mut Vec<u8>) {
    tpkt::send(script, &[0x06, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00]).unwrap();
}

fn frame_dt(script: &mut Vec<u8>, user_data: &[u8]) {
    cotp::send_data(script, user_data).unwrap();
}

fn confirmed_response_pdu(invoke_id: u16) -> Vec<u8> {
    let mut inner = vec![0x02, 0x02, (invoke_id >> 8) as u8, invoke_id as u8];
    inner.extend(ber::tlv(0xA5, &[]));
    let choice = ber::tlv(0xA1, &inner);
    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(choice);
    let sequence = ber::tlv(0x30, &body);
    let application = ber::tlv(0x61, &sequence);
    [PREFIX.to_vec(), application].concat()
}

fn report_pdu(rpt_id: &str, seq_num: u32) -> Vec<u8> {
    let mut list = Vec::new();
    list.extend(ber::tlv(0x8A, rpt_id.as_bytes())); // RptID
    list.extend(ber::encode_bit_string(&[0x06, 0x7B, 0x00])); // OptFlds
    list.extend(ber::encode_unsigned(seq_num)); // SeqNum
    list.extend(ber::tlv(0x8C, &[0x65, 0xD1, 0x4D, 0x80])); // TimeOfEntry
    list.extend(ber::tlv(0x8A, b"VMC7_1LD0/LLN0$DS_LDPHAS1")); // DatSet
    list.extend(ber::encode_boolean(false)); // BufOvfl
    list.extend(ber::encode_octet_string(&[0; 8])); // EntryID
    list.extend(ber::encode_bit_string(&[0x06, 0xC0])); // Inclusion
    list.extend(ber::tlv(0x87, &[0x08, 0x3F, 0x80, 0x00, 0x00])); // one member

    let list = ber::tlv(0xA0, &list);
    let name = ber::tlv(0xA1, &ber::tlv(0x80, b"RPT"));
    let report = ber::tlv(0xA3, &[name, list].concat());
    let unconfirmed = ber::tlv(0xA0, &report);
    let mut body = vec![0x02, 0x01, 0x03];
    body.extend(unconfirmed);
    let sequence = ber::tlv(0x30, &body);
    let application = ber::tlv(0x61, &sequence);
    [PREFIX.to_vec(), application].concat()
}

// handshake preamble shared by every scenario: CC, then an opaque
// Initiate response
fn handshake(script: &mut Vec<u8>) {
    frame_cc(script);
    frame_dt(script, &[0xA9, 0x03, 0x01, 0x02, 0x03]);
}

fn invoke_id_of(application: &[u8]) -> Option<u16> {
    let (outer, _) = ber::read_tlv(application)?;
    let (sequence, _) = ber::read_tlv(outer.value)?;
    let mut rest = sequence.value;
    if let Some((head, used)) = ber::read_tlv(rest) {
        if head.tag == 0x02 {
            rest = &rest[used..];
        }
    }
    let (wrapper, _) = ber::read_tlv(rest)?;
    let (request, _) = ber::read_tlv(wrapper.value)?;
    let (invoke, _) = ber::read_tlv(request.value)?;
    if invoke.tag != 0x02 || invoke.value.len() != 2 {
        return None;
    }
    Some(u16::from(invoke.value[0]) << 8 | u16::from(invoke.value[1]))
}

// invoke-IDs of every confirmed request the client put on the wire
fn request_invoke_ids(output: &[u8]) -> Vec<u16> {
    let mut cursor = Cursor::new(output.to_vec());
    let mut ids = Vec::new();
    while let Ok(Some(tpdu)) = tpkt::recv(&mut cursor) {
        if tpdu.len() < 3 || tpdu[1] != 0xF0 {
            continue; // the CR TPDU
        }
        let user_data = &tpdu[3..];
        if user_data.len() < 5 || user_data[..4] != PREFIX {
            continue; // the Initiate blob carries no prefix
        }
        if let Some(id) = invoke_id_of(&user_data[4..]) {
            ids.push(id);
        }
    }
    ids
}

fn activation_script() -> Vec<u8> {
    let mut script = Vec::new();
    handshake(&mut script);
    frame_dt(&mut script, &confirmed_response_pdu(0x012C)); // GetRCBValues probe
    frame_dt(&mut script, &confirmed_response_pdu(0x012D)); // ResvTms
    frame_dt(&mut script, &confirmed_response_pdu(0x012E)); // IntgPd
    // a report slips in between the TrgOps write and its response
    frame_dt(&mut script, &report_pdu("EARLY", 1));
    frame_dt(&mut script, &confirmed_response_pdu(0x012F)); // TrgOps
    for invoke_id in 0x0130..=0x0134u16 {
        frame_dt(&mut script, &confirmed_response_pdu(invoke_id));
    }
    script
}

#[test]
fn test_activation_forwards_interleaved_report() {
    let (stream, _) = ScriptedStream::new(activation_script());
    let mut cl = Client::new(stream).unwrap();
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$BR$CB_LDPHAS1_CYPO02");

    let mut seen = Vec::new();
    cl.enable_reporting(&rcb, &RcbSettings::default(), |report| {
        seen.push(report);
    })
    .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].rpt_id.as_deref(), Some("EARLY"));
    assert_eq!(seen[0].seq_num, Some(1));
    assert!(!seen[0].raw_pdu.is_empty());
}

#[test]
fn test_activation_wire_traffic() {
    let (stream, output) = ScriptedStream::new(activation_script());
    let mut cl = Client::new(stream).unwrap();
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$BR$CB_LDPHAS1_CYPO02");
    cl.enable_reporting(&rcb, &RcbSettings::default(), |_| {})
        .unwrap();

    let output = output.borrow();
    // the CR TPDU opens the conversation
    assert_eq!(&output[..6], &[0x03, 0x00, 0x00, 0x16, 0x11, 0xE0]);
    // the Initiate blob went out verbatim inside a DT TPDU
    let initiate = mms61850::mms::encode_initiate();
    assert!(output
        .windows(initiate.len())
        .any(|window| window == &initiate[..]));

    // probe + 8 attribute writes, invoke-IDs strictly sequential
    let ids = request_invoke_ids(&output);
    assert_eq!(ids, (0x012C..=0x0134).collect::<Vec<u16>>());
}

#[test]
fn test_activation_eof_mid_sequence_is_error() {
    let mut script = Vec::new();
    handshake(&mut script);
    frame_dt(&mut script, &confirmed_response_pdu(0x012C));
    frame_dt(&mut script, &confirmed_response_pdu(0x012D));
    // the peer goes away before the remaining responses

    let (stream, _) = ScriptedStream::new(script);
    let mut cl = Client::new(stream).unwrap();
    let rcb = RcbReference::new("VMC7_1LD0", "LLN0$BR$CB_LDPHAS1_CYPO02");
    match cl.enable_reporting(&rcb, &RcbSettings::default(), |_| {}) {
        Err(Error::Disconnected) => {}
        other => panic!("expected disconnect error, got {:?}", other),
    }
}

#[test]
fn test_loop_reports_until_clean_eof() {
    let mut script = Vec::new();
    handshake(&mut script);
    frame_dt(&mut script, &report_pdu("CYCLIC", 4));
    frame_dt(&mut script, &report_pdu("CYCLIC", 5));

    let (stream, _) = ScriptedStream::new(script);
    let mut cl = Client::new(stream).unwrap();
    let mut seqs = Vec::new();
    cl.loop_reports(|report| seqs.push(report.seq_num)).unwrap();

    assert_eq!(seqs, vec![Some(4), Some(5)]);
}

#[test]
fn test_loop_reports_skips_responses() {
    let mut script = Vec::new();
    handshake(&mut script);
    frame_dt(&mut script, &confirmed_response_pdu(0x0200));
    frame_dt(&mut script, &report_pdu("ONLY", 9));

    let (stream, _) = ScriptedStream::new(script);
    let mut cl = Client::new(stream).unwrap();
    let mut count = 0;
    cl.loop_reports(|_| count += 1).unwrap();

    assert_eq!(count, 1);
}

#[test]
fn test_loop_reports_half_buffered_pdu_is_not_delivered() {
    let mut script = Vec::new();
    handshake(&mut script);
    frame_dt(&mut script, &report_pdu("LAST", 2));
    // the connection dies two bytes into the next TPKT header
    script.extend_from_slice(&[0x03, 0x00]);

    let (stream, _) = ScriptedStream::new(script);
    let mut cl = Client::new(stream).unwrap();
    let mut count = 0;
    match cl.loop_reports(|_| count += 1) {
        Err(Error::Framing(_)) => {}
        other => panic!("expected framing error, got {:?}", other),
    }
    assert_eq!(count, 1);
}

#[test]
fn test_connect_fails_on_non_cc() {
    let mut script = Vec::new();
    // a DR TPDU where the CC belongs
    tpkt::send(&mut script, &[0x06, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00]).unwrap();

    let (stream, _) = ScriptedStream::new(script);
    match Client::new(stream) {
        Err(Error::Cotp(_)) => {}
        Ok(_) => panic!("expected COTP error"),
        Err(other) => panic!("expected COTP error, got {:?}", other),
    }
}

#[test]
fn test_connect_fails_on_eof_before_initiate_response() {
    let mut script = Vec::new();
    frame_cc(&mut script);
    // EOF where the Initiate response belongs

    let (stream, _) = ScriptedStream::new(script);
    match Client::new(stream) {
        Err(Error::Initiate(_)) => {}
        Ok(_) => panic!("expected initiate error"),
        Err(other) => panic!("expected initiate error, got {:?}", other),
    }
}
