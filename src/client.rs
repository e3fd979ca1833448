// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! The MMS reports session
//!
//! [`Client`] owns the byte stream and drives the whole session:
//! COTP handshake, MMS Initiate, RCB activation and the report loop.
//! Confirmed requests and asynchronous reports share one TCP flow, so
//! every wait for a response also forwards any report that slips in
//! between.
//!
//! A session is single-threaded: all operations serialize through the
//! one stream. Run one `Client` per IED, each on its own thread.

use super::ber;
use super::constant;
use super::cotp;
use super::error::Error;
use super::mms::{self, PduKind};
use super::rcb::{self, RcbReference, RcbSettings};
use super::report::{self, MmsReport};
use super::tcp;
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An established MMS session over a byte stream.
///
/// The stream is owned exclusively and dropped (closing the socket for
/// TCP) when the client goes away or a transport error ends the session.
pub struct Client<S: Read + Write> {
    stream: S,
    invoke_id: u16,
    stop: Arc<AtomicBool>,
}

impl Client<TcpStream> {
    /// Opens a TCP connection and establishes the session on it.
    ///
    /// A failure after the socket opened drops it before returning.
    pub fn new_tcp(options: tcp::Options) -> Result<Client<TcpStream>, Error> {
        let stream = tcp::connect(&options)?;
        info!("connected to {}", options.address());
        Client::new(stream)
    }
}

impl<S: Read + Write> Client<S> {
    /// Establishes the session on an already-open byte stream: COTP
    /// CR/CC, then the MMS Initiate exchange. Resets the invoke-ID.
    pub fn new(stream: S) -> Result<Client<S>, Error> {
        Client::with_cotp(stream, &cotp::Options::default())
    }

    /// Like [`Client::new`] with explicit COTP parameters (TSAPs, TPDU
    /// size) for IEDs that check them.
    pub fn with_cotp(mut stream: S, options: &cotp::Options) -> Result<Client<S>, Error> {
        cotp::connect(&mut stream, options)?;
        debug!("COTP connection established");

        let initiate = mms::encode_initiate();
        debug!(
            ">>> MMS InitiateRequest ({} bytes): {}",
            initiate.len(),
            hex_debug(&initiate)
        );
        cotp::send_data(&mut stream, &initiate)?;

        let response = match cotp::recv_data(&mut stream) {
            Ok(Some(response)) => response,
            Ok(None) => {
                return Err(Error::Initiate(
                    "connection closed while waiting for the response".to_string(),
                ))
            }
            Err(Error::Timeout) => {
                return Err(Error::Initiate(
                    "timed out waiting for the response".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };
        debug!(
            "<<< MMS InitiateResponse ({} bytes): {}",
            response.len(),
            hex_debug(&response)
        );

        Ok(Client {
            stream,
            invoke_id: constant::INVOKE_ID_BASE,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    fn next_invoke_id(&mut self) -> u16 {
        let id = self.invoke_id;
        self.invoke_id = self.invoke_id.wrapping_add(1);
        id
    }

    /// Flag shared with [`Client::loop_reports`]; store `true` (from a
    /// signal handler, another thread, ...) to make the loop return
    /// after the PDU it is handling.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Reads the RCB with a single GetRCBValues and returns the raw
    /// response PDU. Reports arriving in between go to `on_report`.
    pub fn read_rcb_values<F>(
        &mut self,
        rcb: &RcbReference,
        mut on_report: F,
    ) -> Result<Vec<u8>, Error>
    where
        F: FnMut(MmsReport),
    {
        let invoke_id = self.next_invoke_id();
        let pdu = mms::encode_get_rcb(&rcb.domain_id, &rcb.item_id, invoke_id);
        debug!(">>> GetRCBValues {} ({} bytes)", rcb, pdu.len());
        cotp::send_data(&mut self.stream, &pdu)?;
        self.wait_response(&mut on_report)
    }

    /// Activates reporting on one RCB: the optional GetRCBValues probe,
    /// then one SetRCBValues per attribute in the canonical order,
    /// awaiting each confirmed response before the next write.
    ///
    /// Reports the IED emits during the sequence (a general
    /// interrogation can start before `GI` is even written) are
    /// forwarded to `on_report` as they arrive.
    pub fn enable_reporting<F>(
        &mut self,
        rcb: &RcbReference,
        settings: &RcbSettings,
        mut on_report: F,
    ) -> Result<(), Error>
    where
        F: FnMut(MmsReport),
    {
        if settings.read_before_write {
            let response = self.read_rcb_values(rcb, &mut on_report)?;
            debug!("<<< GetRCBValuesResponse ({} bytes)", response.len());
        }

        for (attribute, value) in rcb::attribute_writes(settings) {
            let invoke_id = self.next_invoke_id();
            let pdu =
                mms::encode_set_rcb_attribute(&rcb.domain_id, &rcb.item_id, attribute, &value, invoke_id);
            debug!(
                ">>> SetRCBValues ${} ({} bytes): {}",
                attribute,
                pdu.len(),
                hex_debug(&pdu)
            );
            cotp::send_data(&mut self.stream, &pdu)?;

            let response = self.wait_response(&mut on_report)?;
            debug!(
                "<<< SetRCBValuesResponse ${} ({} bytes)",
                attribute,
                response.len()
            );
        }
        info!("reporting enabled on {}", rcb);
        Ok(())
    }

    /// Turns reporting off again with a single `RptEna = false` write.
    pub fn disable_reporting<F>(
        &mut self,
        rcb: &RcbReference,
        mut on_report: F,
    ) -> Result<(), Error>
    where
        F: FnMut(MmsReport),
    {
        let invoke_id = self.next_invoke_id();
        let pdu = mms::encode_set_rcb_attribute(
            &rcb.domain_id,
            &rcb.item_id,
            "RptEna",
            &ber::encode_boolean(false),
            invoke_id,
        );
        cotp::send_data(&mut self.stream, &pdu)?;
        self.wait_response(&mut on_report)?;
        info!("reporting disabled on {}", rcb);
        Ok(())
    }

    // Reads PDUs until the confirmed response for the request in flight
    // arrives. Reports are forwarded, anything else is skipped. EOF here
    // is always an error: a response is still owed.
    fn wait_response<F>(&mut self, on_report: &mut F) -> Result<Vec<u8>, Error>
    where
        F: FnMut(MmsReport),
    {
        loop {
            let pdu = match cotp::recv_data(&mut self.stream)? {
                Some(pdu) => pdu,
                None => return Err(Error::Disconnected),
            };
            match mms::classify(&pdu) {
                PduKind::Report => on_report(report::decode(&pdu)),
                PduKind::ConfirmedResponse => return Ok(pdu),
                PduKind::Other => warn!(
                    "ignoring unexpected PDU ({} bytes): {}",
                    pdu.len(),
                    hex_debug(&pdu)
                ),
            }
        }
    }

    /// Blocking receive loop delivering each report to `on_report`.
    ///
    /// Returns `Ok(())` on clean EOF from the peer or when the stop flag
    /// is set. Read timeouts only produce a heartbeat log line; framing
    /// and transport problems end the loop with the error.
    pub fn loop_reports<F>(&mut self, mut on_report: F) -> Result<(), Error>
    where
        F: FnMut(MmsReport),
    {
        info!("waiting for reports");
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("stop requested, leaving the report loop");
                return Ok(());
            }

            let pdu = match cotp::recv_data(&mut self.stream) {
                Ok(Some(pdu)) => pdu,
                Ok(None) => {
                    info!("connection closed by the server");
                    return Ok(());
                }
                Err(Error::Timeout) => {
                    info!("no report within the read timeout, still listening");
                    continue;
                }
                Err(e) => return Err(e),
            };

            match mms::classify(&pdu) {
                PduKind::Report => {
                    debug!("<<< report PDU ({} bytes): {}", pdu.len(), hex_debug(&pdu));
                    on_report(report::decode(&pdu));
                }
                _ => warn!(
                    "ignoring non-report PDU ({} bytes): {}",
                    pdu.len(),
                    hex_debug(&pdu)
                ),
            }
        }
    }

    /// Ends the session; the underlying stream is dropped, which closes
    /// the socket for TCP transports.
    pub fn close(self) {}
}

// hex preview capped for debug logs
fn hex_debug(data: &[u8]) -> String {
    const MAX: usize = 128;
    if data.len() <= MAX {
        ber::hex_str(data)
    } else {
        format!(
            "{} ... (+{} bytes)",
            ber::hex_str(&data[..MAX]),
            data.len() - MAX
        )
    }
}
