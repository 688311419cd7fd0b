//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Network connection error
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Printer is offline or unreachable
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// USB support is not compiled in or libusb could not be initialized
    #[error("USB capability not available on this host")]
    UsbUnavailable,

    /// No attached device matches the configured ids
    #[error("USB device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Device has no bulk OUT endpoint on its first interface
    #[error("USB device {0} has no bulk OUT endpoint")]
    NoBulkEndpoint(String),

    /// libusb reported an error (open, claim, transfer)
    #[error("USB error: {0}")]
    Usb(String),

    /// Device accepted fewer bytes than sent
    #[error("Incomplete write: {written} of {expected} bytes")]
    IncompleteWrite { written: usize, expected: usize },
}

impl PrintError {
    /// Stable failure kind, recorded next to the human-readable message
    pub fn kind(&self) -> &'static str {
        match self {
            PrintError::Connection(_) => "connection",
            PrintError::Io(_) => "io",
            PrintError::Offline(_) => "offline",
            PrintError::Timeout(_) => "timeout",
            PrintError::InvalidConfig(_) => "invalid_config",
            PrintError::UsbUnavailable => "usb_unavailable",
            PrintError::DeviceNotFound { .. } => "device_not_found",
            PrintError::NoBulkEndpoint(_) => "no_bulk_endpoint",
            PrintError::Usb(_) => "usb",
            PrintError::IncompleteWrite { .. } => "incomplete_write",
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
