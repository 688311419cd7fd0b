//! # crab-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Fixed-width text layout helpers
//! - Network printing (raw TCP, port 9100)
//! - USB printing (bulk transfer, `usb` feature)
//! - USB and network printer discovery
//!
//! Business logic (WHAT to print) stays in the agent:
//! - KOT, bill and test page rendering → print-agent
//!
//! ## Example
//!
//! ```ignore
//! use crab_printer::{EscPosBuilder, NetworkPrinter, Printer};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.double_size();
//! builder.line("KOT #7");
//! builder.reset_size();
//! builder.sep_double();
//! builder.left();
//! builder.line("Table: 12");
//! builder.cut();
//!
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build()).await?;
//! ```

pub mod discovery;
mod error;
mod escpos;
mod printer;
pub mod text;
mod usb;

// Re-exports
pub use discovery::{
    DiscoveredNetworkPrinter, DiscoveredUsbPrinter, UsbDiscovery, UsbPrinterStatus,
    probe_network, subnet_candidates,
};
pub use error::{PrintError, PrintResult};
pub use escpos::{CharScale, DrawerPin, EscPosBuilder, commands, plain_text_job};
pub use printer::{DEFAULT_PORT, NetworkPrinter, Printer, split_host_port};
pub use usb::{UsbPrinter, UsbSupport};

#[cfg(feature = "usb")]
pub use usb::RusbBus;
