//! Printer Configuration Model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw TCP port most thermal printers listen on
pub const DEFAULT_PRINTER_PORT: u16 = 9100;

/// Which station a printer serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterRole {
    Counter,
    Kitchen,
    Bar,
}

impl PrinterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterRole::Counter => "counter",
            PrinterRole::Kitchen => "kitchen",
            PrinterRole::Bar => "bar",
        }
    }
}

impl fmt::Display for PrinterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrinterRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "counter" => Ok(PrinterRole::Counter),
            "kitchen" => Ok(PrinterRole::Kitchen),
            "bar" => Ok(PrinterRole::Bar),
            other => Err(format!("Unknown printer role: {}", other)),
        }
    }
}

/// Physical connection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterType {
    Usb,
    Network,
    Bluetooth,
}

/// Paper format; drives the column budget used by the renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperFormat {
    #[serde(rename = "58mm")]
    Mm58,
    #[serde(rename = "76mm")]
    Mm76,
    #[default]
    #[serde(rename = "80mm")]
    Mm80,
    #[serde(rename = "a5")]
    A5,
    #[serde(rename = "a4")]
    A4,
}

impl PaperFormat {
    /// Characters per line in the printer's normal font
    pub fn columns(&self) -> usize {
        match self {
            PaperFormat::Mm58 => 32,
            PaperFormat::Mm76 => 42,
            PaperFormat::Mm80 => 48,
            PaperFormat::A5 => 64,
            PaperFormat::A4 => 80,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrinterConfigError {
    #[error("USB printer '{0}' needs vendorId and productId")]
    MissingUsbIds(String),

    #[error("Network printer '{0}' needs an ipAddress")]
    MissingAddress(String),

    #[error("Bluetooth printers are not supported: '{0}'")]
    UnsupportedType(String),

    #[error("Printer name must not be empty")]
    EmptyName,
}

/// Resolved transport target for a printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterConnection {
    Usb { vendor_id: u16, product_id: u16 },
    Network { host: String, port: u16 },
}

/// Printer configuration (created in settings, read at send time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterConfig {
    /// Assigned on save when empty
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub printer_type: PrinterType,
    #[serde(default)]
    pub vendor_id: Option<u16>,
    #[serde(default)]
    pub product_id: Option<u16>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    pub role: PrinterRole,
    #[serde(default)]
    pub format: PaperFormat,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl PrinterConfig {
    /// Resolve the transport target, rejecting incomplete configs
    pub fn connection(&self) -> Result<PrinterConnection, PrinterConfigError> {
        match self.printer_type {
            PrinterType::Usb => match (self.vendor_id, self.product_id) {
                (Some(vendor_id), Some(product_id)) => Ok(PrinterConnection::Usb {
                    vendor_id,
                    product_id,
                }),
                _ => Err(PrinterConfigError::MissingUsbIds(self.name.clone())),
            },
            PrinterType::Network => {
                let host = self
                    .ip_address
                    .as_deref()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| PrinterConfigError::MissingAddress(self.name.clone()))?;
                Ok(PrinterConnection::Network {
                    host: host.to_string(),
                    port: self.port.unwrap_or(DEFAULT_PRINTER_PORT),
                })
            }
            PrinterType::Bluetooth => Err(PrinterConfigError::UnsupportedType(self.name.clone())),
        }
    }

    /// Validate before saving
    pub fn validate(&self) -> Result<(), PrinterConfigError> {
        if self.name.trim().is_empty() {
            return Err(PrinterConfigError::EmptyName);
        }
        self.connection().map(|_| ())
    }
}

/// Pick the printer serving `role`: the active default wins, otherwise the
/// first active printer by name.
pub fn select_printer(printers: &[PrinterConfig], role: PrinterRole) -> Option<&PrinterConfig> {
    let mut candidates: Vec<&PrinterConfig> = printers
        .iter()
        .filter(|p| p.is_active && p.role == role)
        .collect();
    candidates.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.name.cmp(&b.name)));
    candidates.into_iter().next()
}
