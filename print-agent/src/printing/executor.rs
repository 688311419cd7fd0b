//! Print job executor
//!
//! Routes rendered bytes to the transport a printer config names.

use std::time::Duration;

use async_trait::async_trait;
use crab_printer::{NetworkPrinter, PrintError, PrintResult, Printer, UsbSupport};
use shared::models::{PrinterConfig, PrinterConnection};
use tracing::{info, instrument};

/// Delivery seam between the dispatcher and the transports
#[async_trait]
pub trait PrintSink: Send + Sync {
    /// Whether `printer` can be used at all on this host
    ///
    /// Cheap and local: config completeness and transport capability. It
    /// does not probe the device.
    async fn check(&self, printer: &PrinterConfig) -> PrintResult<()>;

    /// Deliver bytes to `printer`
    async fn send(&self, printer: &PrinterConfig, data: &[u8]) -> PrintResult<()>;

    /// Whether USB printers can be driven from this host
    fn usb_available(&self) -> bool;
}

/// Print job executor
///
/// Opens a fresh connection or device handle per send; nothing is kept
/// open between jobs.
#[derive(Debug, Clone)]
pub struct PrintExecutor {
    usb: UsbSupport,
    network_timeout: Duration,
}

impl PrintExecutor {
    pub fn new(usb: UsbSupport, network_timeout: Duration) -> Self {
        Self {
            usb,
            network_timeout,
        }
    }

    pub fn usb(&self) -> &UsbSupport {
        &self.usb
    }

    fn connection(printer: &PrinterConfig) -> PrintResult<PrinterConnection> {
        printer
            .connection()
            .map_err(|e| PrintError::InvalidConfig(e.to_string()))
    }
}

#[async_trait]
impl PrintSink for PrintExecutor {
    async fn check(&self, printer: &PrinterConfig) -> PrintResult<()> {
        match Self::connection(printer)? {
            PrinterConnection::Usb { .. } if !self.usb.is_available() => {
                Err(PrintError::UsbUnavailable)
            }
            _ => Ok(()),
        }
    }

    #[instrument(skip(self, printer, data), fields(printer = %printer.name, bytes = data.len()))]
    async fn send(&self, printer: &PrinterConfig, data: &[u8]) -> PrintResult<()> {
        match Self::connection(printer)? {
            PrinterConnection::Network { host, port } => {
                NetworkPrinter::new(&host, port)?
                    .with_timeout(self.network_timeout)
                    .print(data)
                    .await?
            }
            PrinterConnection::Usb {
                vendor_id,
                product_id,
            } => self.usb.printer(vendor_id, product_id).print(data).await?,
        }

        info!("Print data delivered");
        Ok(())
    }

    fn usb_available(&self) -> bool {
        self.usb.is_available()
    }
}
