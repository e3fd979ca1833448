// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! This crate provides an IEC 61850 MMS client for subscribing to
//! report control blocks on substation IEDs: it establishes the session
//! over TCP/TPKT/COTP, activates reporting on a BRCB or URCB, and
//! decodes the incoming `informationReport` PDUs into [`report::MmsReport`].
//! # Examples
//! ```no_run
//! # extern crate mms61850;
//! # use mms61850::{client::Client, rcb::{RcbReference, RcbSettings}, tcp};
//! # use std::net::{Ipv4Addr, IpAddr};
//! # use std::time::Duration;
//!
//! # fn main() {
//!     let addr = Ipv4Addr::new(10, 132, 159, 191);
//!     let mut opts = tcp::Options::with_default_port(IpAddr::from(addr));
//!     opts.read_timeout = tcp::IDLE_TIMEOUT;
//!     let mut cl = match Client::new_tcp(opts) {
//!         Ok(cl) => cl,
//!         Err(e) => {
//!             println!("{}", e);
//!             return;
//!         }
//!     };
//!
//!     let rcb = RcbReference::new("VMC7_1LD0", "LLN0$BR$CB_LDPHAS1_CYPO02");
//!     let settings = RcbSettings::default();
//!
//!     cl.enable_reporting(&rcb, &settings, |report| {
//!         println!("early report: {:?}", report.rpt_id);
//!     })
//!     .unwrap();
//!
//!     cl.loop_reports(|report| {
//!         println!("seq {:?}: {} entries", report.seq_num, report.entries.len());
//!     })
//!     .unwrap();
//! # }
//! ```
pub mod ber;
pub mod client;
mod constant;
pub mod cotp;
pub mod error;
pub mod mms;
pub mod rcb;
pub mod report;
pub mod tcp;
pub mod tpkt;
