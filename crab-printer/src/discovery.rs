//! Printer discovery
//!
//! USB: enumerate the bus and keep devices that look like receipt printers,
//! either by USB printer class or by a known thermal-printer vendor id.
//! Network: probe candidate hosts for an open raw-print port.
//!
//! Discovery never fails hard. Bus errors and unavailable USB support come
//! back as `success: false` with a message.

use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{PrintError, PrintResult};
use crate::printer::DEFAULT_PORT;

/// USB interface/device class code for printers
pub const USB_CLASS_PRINTER: u8 = 0x07;

/// Vendor ids of common thermal receipt printer makers
pub const THERMAL_PRINTER_VENDORS: &[u16] = &[
    0x04B8, // Epson
    0x0519, // Star Micronics
    0x1504, // Bixolon
    0x1D90, // Citizen
    0x154F, // SNBC
    0x0416, // Winbond (many OEM POS printers)
    0x0483, // STMicroelectronics (OEM boards)
    0x0FE6, // ICS Advent / Kontron
    0x20D1, // Rongta
    0x28E9, // GD32 (OEM boards)
    0x1FC9, // NXP (OEM boards)
];

/// Concurrent connection attempts during a network sweep
const PROBE_CONCURRENCY: usize = 64;

/// Minimal view of a USB device, as reported by the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbDeviceSummary {
    pub bus: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_class: u8,
    pub interface_classes: Vec<u8>,
}

impl UsbDeviceSummary {
    /// Printer class at device or interface level, or a known vendor
    pub fn looks_like_printer(&self) -> bool {
        self.device_class == USB_CLASS_PRINTER
            || self.interface_classes.contains(&USB_CLASS_PRINTER)
            || THERMAL_PRINTER_VENDORS.contains(&self.vendor_id)
    }

    fn fallback_name(&self) -> String {
        format!("USB Printer ({:04x}:{:04x})", self.vendor_id, self.product_id)
    }
}

/// Descriptor strings read from an opened device
#[derive(Debug, Clone, Default)]
pub struct UsbStrings {
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// Source of USB devices for discovery
pub trait UsbBus {
    /// List every device on the bus
    fn devices(&self) -> PrintResult<Vec<UsbDeviceSummary>>;

    /// Open a device and read its descriptor strings
    fn describe(&self, device: &UsbDeviceSummary) -> PrintResult<UsbStrings>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsbPrinterStatus {
    /// Opened and described successfully
    Connected,
    /// Present but could not be opened (claimed elsewhere or no permission)
    InUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredUsbPrinter {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub name: String,
    pub status: UsbPrinterStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsbDiscovery {
    pub success: bool,
    pub printers: Vec<DiscoveredUsbPrinter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsbDiscovery {
    pub fn unavailable() -> Self {
        Self::failed(PrintError::UsbUnavailable.to_string())
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            printers: Vec::new(),
            error: Some(error),
        }
    }
}

/// Enumerate printer-like USB devices
pub fn discover_usb(bus: &impl UsbBus) -> UsbDiscovery {
    let devices = match bus.devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "USB enumeration failed");
            return UsbDiscovery::failed(e.to_string());
        }
    };

    let printers: Vec<_> = devices
        .iter()
        .filter(|d| d.looks_like_printer())
        .map(|device| match bus.describe(device) {
            Ok(strings) => {
                let name = match (&strings.manufacturer, &strings.product) {
                    (Some(m), Some(p)) => format!("{} {}", m.trim(), p.trim()),
                    (None, Some(p)) => p.trim().to_string(),
                    (Some(m), None) => m.trim().to_string(),
                    (None, None) => device.fallback_name(),
                };
                DiscoveredUsbPrinter {
                    vendor_id: device.vendor_id,
                    product_id: device.product_id,
                    manufacturer: strings.manufacturer,
                    product: strings.product,
                    name,
                    status: UsbPrinterStatus::Connected,
                }
            }
            Err(e) => {
                debug!(
                    vendor_id = device.vendor_id,
                    product_id = device.product_id,
                    error = %e,
                    "USB printer could not be opened"
                );
                DiscoveredUsbPrinter {
                    vendor_id: device.vendor_id,
                    product_id: device.product_id,
                    manufacturer: None,
                    product: None,
                    name: device.fallback_name(),
                    status: UsbPrinterStatus::InUse,
                }
            }
        })
        .collect();

    info!(found = printers.len(), scanned = devices.len(), "USB discovery finished");
    UsbDiscovery {
        success: true,
        printers,
        error: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredNetworkPrinter {
    pub ip: String,
    pub port: u16,
    pub name: String,
}

/// Every host address `.1` to `.254` in a /24, paired with `port`
///
/// Accepts `"192.168.1"`, `"192.168.1.0"` or `"192.168.1.0/24"`.
pub fn subnet_candidates(subnet: &str, port: u16) -> PrintResult<Vec<(String, u16)>> {
    let base = subnet.trim().trim_end_matches("/24");
    let octets: Vec<&str> = base.split('.').collect();
    if !(3..=4).contains(&octets.len()) {
        return Err(PrintError::InvalidConfig(format!("Invalid subnet: {}", subnet)));
    }

    let mut prefix = [0u8; 3];
    for (slot, octet) in prefix.iter_mut().zip(&octets[..3]) {
        *slot = octet
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid subnet: {}", subnet)))?;
    }

    let port = if port == 0 { DEFAULT_PORT } else { port };
    Ok((1..=254u8)
        .map(|host| {
            (
                format!("{}.{}.{}.{}", prefix[0], prefix[1], prefix[2], host),
                port,
            )
        })
        .collect())
}

/// Probe candidates for an open raw-print port
///
/// Results keep the order of `candidates`.
pub async fn probe_network(
    candidates: Vec<(String, u16)>,
    timeout: Duration,
) -> Vec<DiscoveredNetworkPrinter> {
    let total = candidates.len();
    let found: Vec<_> = futures::stream::iter(candidates)
        .map(|(ip, port)| async move {
            let open = matches!(
                tokio::time::timeout(timeout, TcpStream::connect((ip.as_str(), port))).await,
                Ok(Ok(_))
            );
            open.then(|| DiscoveredNetworkPrinter {
                name: format!("Network Printer ({}:{})", ip, port),
                ip,
                port,
            })
        })
        .buffered(PROBE_CONCURRENCY)
        .filter_map(|hit| async move { hit })
        .collect()
        .await;

    info!(found = found.len(), probed = total, "Network discovery finished");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct FakeBus {
        devices: Vec<UsbDeviceSummary>,
        strings: HashMap<(u8, u8), UsbStrings>,
        enumerate_error: bool,
    }

    impl UsbBus for FakeBus {
        fn devices(&self) -> PrintResult<Vec<UsbDeviceSummary>> {
            if self.enumerate_error {
                return Err(PrintError::Usb("enumerate failed: Access denied".into()));
            }
            Ok(self.devices.clone())
        }

        fn describe(&self, device: &UsbDeviceSummary) -> PrintResult<UsbStrings> {
            self.strings
                .get(&(device.bus, device.address))
                .cloned()
                .ok_or_else(|| PrintError::Usb("open device failed: Resource busy".into()))
        }
    }

    fn device(address: u8, vendor_id: u16, product_id: u16, class: u8) -> UsbDeviceSummary {
        UsbDeviceSummary {
            bus: 1,
            address,
            vendor_id,
            product_id,
            device_class: class,
            interface_classes: vec![],
        }
    }

    #[test]
    fn test_empty_bus_is_success_with_no_printers() {
        let result = discover_usb(&FakeBus::default());
        assert!(result.success);
        assert!(result.printers.is_empty());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_enumeration_error_is_reported() {
        let bus = FakeBus {
            enumerate_error: true,
            ..Default::default()
        };
        let result = discover_usb(&bus);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Access denied"));
    }

    #[test]
    fn test_classification() {
        // Keyboard from an unrelated vendor
        assert!(!device(2, 0x046D, 0xC31C, 0x00).looks_like_printer());
        // Known vendor, vendor-specific class
        assert!(device(3, 0x04B8, 0x0E15, 0xFF).looks_like_printer());
        // Unknown vendor, printer class on the interface only
        let mut composite = device(4, 0xABCD, 0x0001, 0x00);
        composite.interface_classes = vec![0x03, USB_CLASS_PRINTER];
        assert!(composite.looks_like_printer());
    }

    #[test]
    fn test_discovery_names_and_status() {
        let mut bus = FakeBus::default();
        bus.devices = vec![
            device(2, 0x046D, 0xC31C, 0x00),
            device(3, 0x04B8, 0x0E15, 0x00),
            device(4, 0x0416, 0x5011, USB_CLASS_PRINTER),
        ];
        bus.strings.insert(
            (1, 3),
            UsbStrings {
                manufacturer: Some("EPSON".into()),
                product: Some("TM-T82".into()),
            },
        );

        let result = discover_usb(&bus);
        assert!(result.success);
        assert_eq!(result.printers.len(), 2);

        let epson = &result.printers[0];
        assert_eq!(epson.name, "EPSON TM-T82");
        assert_eq!(epson.status, UsbPrinterStatus::Connected);

        let busy = &result.printers[1];
        assert_eq!(busy.name, "USB Printer (0416:5011)");
        assert_eq!(busy.status, UsbPrinterStatus::InUse);
        assert!(busy.manufacturer.is_none());
    }

    #[test]
    fn test_discovery_serializes_camel_case() {
        let printer = DiscoveredUsbPrinter {
            vendor_id: 0x0416,
            product_id: 0x5011,
            manufacturer: None,
            product: None,
            name: "USB Printer (0416:5011)".into(),
            status: UsbPrinterStatus::InUse,
        };
        let json = serde_json::to_value(&printer).unwrap();
        assert_eq!(json["vendorId"], 0x0416);
        assert_eq!(json["status"], "in_use");
        assert!(json["manufacturer"].is_null());
    }

    #[test]
    fn test_subnet_candidates() {
        let hosts = subnet_candidates("192.168.1", 9100).unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts[0], ("192.168.1.1".to_string(), 9100));
        assert_eq!(hosts[253].0, "192.168.1.254");

        let hosts = subnet_candidates("10.0.0.0/24", 0).unwrap();
        assert_eq!(hosts[0], ("10.0.0.1".to_string(), DEFAULT_PORT));

        assert!(subnet_candidates("10.0", 9100).is_err());
        assert!(subnet_candidates("300.1.1", 9100).is_err());
    }

    #[tokio::test]
    async fn test_probe_network_finds_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        let closed_port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };

        let found = probe_network(
            vec![
                ("127.0.0.1".to_string(), closed_port),
                ("127.0.0.1".to_string(), open_port),
            ],
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].port, open_port);
        assert_eq!(found[0].ip, "127.0.0.1");
    }
}
