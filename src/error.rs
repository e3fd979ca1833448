// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

use std::error;
use std::fmt;
use std::io::{Error as IOError, ErrorKind};

/// Errors raised by the transport layers and the reports client.
///
/// `Timeout` is the only recoverable variant: the read deadline expired but
/// the session is intact and the caller may retry. Everything else closes
/// the session. Decode problems never surface here at all, a malformed
/// report is degraded and still delivered (see `report`).
#[derive(Debug)]
pub enum Error {
    /// TCP connection could not be established
    Connect(String),
    /// socket read/write failure
    Io(ErrorKind),
    /// read deadline expired, the session is still usable
    Timeout,
    /// peer closed the connection while a PDU was still expected
    Disconnected,
    /// payload too large for the 16 bit TPKT length field
    Overflow(usize),
    /// bad TPKT header or truncated TPKT payload
    Framing(String),
    /// unexpected or inconsistent TPDU
    Cotp(String),
    /// failure during the MMS Initiate exchange
    Initiate(String),
    /// RCB reference string is not of the `DOMAIN/ITEM` form
    InvalidReference(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connect(s) => write!(f, "connection error: {}", s),
            Error::Io(kind) => write!(f, "IO error: {:?}", kind),
            Error::Timeout => write!(f, "read timed out"),
            Error::Disconnected => write!(f, "connection closed by peer"),
            Error::Overflow(len) => {
                write!(f, "TPKT : payload of {} bytes exceeds the frame limit", len)
            }
            Error::Framing(s) => write!(f, "TPKT : {}", s),
            Error::Cotp(s) => write!(f, "COTP : {}", s),
            Error::Initiate(s) => write!(f, "MMS : initiate failed: {}", s),
            Error::InvalidReference(s) => {
                write!(f, "invalid RCB reference {:?}, expected DOMAIN/ITEM", s)
            }
        }
    }
}

impl From<IOError> for Error {
    fn from(e: IOError) -> Self {
        match e.kind() {
            // a blocking socket with SO_RCVTIMEO reports WouldBlock on Linux
            // and TimedOut on other platforms
            ErrorKind::WouldBlock | ErrorKind::TimedOut => Error::Timeout,
            ErrorKind::UnexpectedEof => Error::Disconnected,
            kind => Error::Io(kind),
        }
    }
}

// This is important for other errors to wrap this one.
impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        None
    }
}
