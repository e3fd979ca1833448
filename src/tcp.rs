// Copyright 2019 Petar Dambovaliev. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! TCP transport for MMS sessions

use super::constant;
use super::error::Error;
use std::net::{IpAddr, TcpStream};
use std::time::Duration;

/// Default request/response timeout
pub const TIMEOUT: Duration = Duration::from_secs(5);
/// Default receive timeout while waiting for reports; on expiry the
/// report loop logs a heartbeat and keeps listening
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// a set of options for the TCP connection
#[derive(Debug, Clone)]
pub struct Options {
    pub connection_timeout: Option<Duration>,
    /// zero disables the read timeout
    pub read_timeout: Duration,
    /// zero disables the write timeout
    pub write_timeout: Duration,
    address: String,
}

impl Options {
    pub fn new(address: IpAddr, port: u16) -> Options {
        Options {
            connection_timeout: None,
            read_timeout: TIMEOUT,
            write_timeout: TIMEOUT,
            address: format!("{}:{}", address, port),
        }
    }

    /// Options for the standard ISO-on-TCP port 102.
    pub fn with_default_port(address: IpAddr) -> Options {
        Options::new(address, constant::ISO_TCP_PORT)
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Opens the socket and applies the configured timeouts.
pub fn connect(options: &Options) -> Result<TcpStream, Error> {
    let stream = match options.connection_timeout {
        Some(timeout) => match options.address.parse::<std::net::SocketAddr>() {
            Ok(socket_address) => TcpStream::connect_timeout(&socket_address, timeout)?,
            Err(e) => return Err(Error::Connect(e.to_string())),
        },
        None => TcpStream::connect(options.address.as_str())?,
    };

    stream.set_read_timeout(non_zero(options.read_timeout))?;
    stream.set_write_timeout(non_zero(options.write_timeout))?;
    Ok(stream)
}

// set_read_timeout rejects a zero Duration, zero means "no timeout" here
fn non_zero(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    }
}

#[test]
fn test_options_address() {
    use std::net::Ipv4Addr;

    let opts = Options::with_default_port(IpAddr::from(Ipv4Addr::new(10, 132, 159, 191)));
    assert_eq!(opts.address(), "10.132.159.191:102");
    let opts = Options::new(IpAddr::from(Ipv4Addr::LOCALHOST), 10102);
    assert_eq!(opts.address(), "127.0.0.1:10102");
}

#[test]
fn test_non_zero_timeout() {
    assert_eq!(non_zero(Duration::ZERO), None);
    assert_eq!(non_zero(TIMEOUT), Some(TIMEOUT));
}
