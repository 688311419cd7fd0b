//! Printer adapters for sending ESC/POS data
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - USB printers (bulk transfer, see [`crate::usb`])
//!
//! Delivery is write-only: success means the bytes were accepted by the
//! socket or the USB stack, not that the paper came out right.

use crate::error::{PrintError, PrintResult};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Raw TCP port most thermal printers listen on
pub const DEFAULT_PORT: u16 = 9100;

/// Split `host[:port]`, accepting bracketed IPv6 (`[fe80::1]:9100`)
///
/// A bare IPv6 literal is taken whole as the host. Returns `None` for a
/// malformed bracket form.
pub fn split_host_port(addr: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return match tail {
            "" => Some((host, None)),
            _ => tail.strip_prefix(':').map(|port| (host, Some(port))),
        };
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Some((host, Some(port))),
        _ => Some((addr, None)),
    }
}

/// Trait for printer adapters
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw ESC/POS data to the printer
    async fn print(&self, data: &[u8]) -> PrintResult<()>;

    /// Check if the printer is online/reachable
    async fn is_online(&self) -> bool;
}

/// Network printer (TCP port 9100)
///
/// Most thermal printers support raw TCP printing on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    host: String,
    port: u16,
    timeout: Duration,
    settle: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer from a host name or IP address
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let host = host.trim();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(PrintError::InvalidConfig(format!(
                "Invalid printer host: '{}'",
                host
            )));
        }
        if port == 0 {
            return Err(PrintError::InvalidConfig("Port must not be 0".to_string()));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            timeout: Duration::from_secs(10),
            settle: Duration::from_millis(100),
        })
    }

    /// Create from an address string (e.g., "192.168.1.100:9100" or "192.168.1.100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let invalid = || PrintError::InvalidConfig(format!("Invalid address: {}", addr));
        match split_host_port(addr).ok_or_else(invalid)? {
            (host, Some(port)) => Self::new(host, port.parse().map_err(|_| invalid())?),
            (host, None) => Self::new(host, DEFAULT_PORT),
        }
    }

    /// Set the overall bound for connect + write + flush
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause between flush and close
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Get the printer address as "host:port"
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn send(&self, data: &[u8]) -> PrintResult<()> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr(), e)))?;

        info!("Connected, sending {} bytes", data.len());

        stream.write_all(data).await.map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Write failed: {}", e),
            ))
        })?;

        stream.flush().await?;

        // Some printers drop buffered data if the peer closes immediately
        tokio::time::sleep(self.settle).await;

        if let Err(e) = stream.shutdown().await {
            warn!(error = %e, "Socket shutdown failed after send");
        }
        Ok(())
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(self, data), fields(addr = %self.addr(), data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        info!("Connecting to printer");

        tokio::time::timeout(self.timeout, self.send(data))
            .await
            .map_err(|_| {
                PrintError::Timeout(format!(
                    "No response from {} within {} ms",
                    self.addr(),
                    self.timeout.as_millis()
                ))
            })??;

        info!("Print job sent successfully");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr()))]
    async fn is_online(&self) -> bool {
        let check_timeout = Duration::from_millis(500);

        match tokio::time::timeout(
            check_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(_)) => {
                info!("Printer online");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.port(), 9100);
        assert_eq!(printer.addr(), "192.168.1.100:9100");
    }

    #[test]
    fn test_network_printer_from_addr() {
        let printer = NetworkPrinter::from_addr("192.168.1.100:9100").unwrap();
        assert_eq!(printer.port(), 9100);

        let printer = NetworkPrinter::from_addr("printer.local").unwrap();
        assert_eq!(printer.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_ipv6_addresses() {
        let printer = NetworkPrinter::from_addr("fe80::1").unwrap();
        assert_eq!(printer.port(), DEFAULT_PORT);
        assert_eq!(printer.addr(), "[fe80::1]:9100");

        let printer = NetworkPrinter::from_addr("[fe80::1]:9101").unwrap();
        assert_eq!(printer.port(), 9101);
        assert_eq!(printer.addr(), "[fe80::1]:9101");

        assert_eq!(split_host_port("[::1]"), Some(("::1", None)));
        assert_eq!(split_host_port("[::1"), None);
        assert_eq!(split_host_port("[::1]9100"), None);
    }

    #[test]
    fn test_invalid_addr() {
        assert!(NetworkPrinter::from_addr("host:notaport").is_err());
        assert!(NetworkPrinter::new("", 9100).is_err());
        assert!(NetworkPrinter::new("10.0.0.1", 0).is_err());
    }

    #[tokio::test]
    async fn test_print_delivers_all_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let printer = NetworkPrinter::new("127.0.0.1", port)
            .unwrap()
            .with_settle_delay(Duration::from_millis(10));
        let data = b"\x1B\x40hello\n\x1D\x56\x00".to_vec();
        printer.print(&data).await.unwrap();

        assert_eq!(server.await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_unreachable_printer_fails_within_bound() {
        // Grab a free port, then close it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let printer = NetworkPrinter::new("127.0.0.1", port)
            .unwrap()
            .with_timeout(Duration::from_secs(2));

        let started = Instant::now();
        let err = printer.print(b"test").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!err.to_string().is_empty());
        assert!(matches!(err.kind(), "connection" | "timeout"));
    }

    #[tokio::test]
    async fn test_blackholed_printer_times_out() {
        // TEST-NET-1 is never routed; either the connect times out or the
        // OS rejects it straight away
        let printer = NetworkPrinter::new("192.0.2.1", 9100)
            .unwrap()
            .with_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let result = printer.print(b"test").await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_is_online() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let printer = NetworkPrinter::new("127.0.0.1", port).unwrap();
        assert!(printer.is_online().await);

        drop(listener);
        assert!(!printer.is_online().await);
    }
}
