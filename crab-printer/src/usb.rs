//! USB printer transport
//!
//! Sends ESC/POS data with a single blocking bulk transfer. The device is
//! opened, its first interface claimed, written to, released and closed
//! inside one call; nothing is held open between jobs.
//!
//! USB support is optional. [`UsbSupport`] resolves once whether the `usb`
//! feature is compiled in and libusb can be initialized; every USB operation
//! checks it and reports [`PrintError::UsbUnavailable`] instead of failing
//! the whole process.

use std::fmt;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::discovery::UsbDiscovery;
use crate::error::{PrintError, PrintResult};
use crate::printer::Printer;

/// Host USB capability, resolved once at construction
#[derive(Clone)]
pub struct UsbSupport {
    #[cfg(feature = "usb")]
    context: Option<rusb::Context>,
}

impl UsbSupport {
    /// Probe the host for USB support
    pub fn detect() -> Self {
        #[cfg(feature = "usb")]
        {
            match rusb::Context::new() {
                Ok(context) => {
                    info!(
                        detach_supported = rusb::supports_detach_kernel_driver(),
                        "USB support available"
                    );
                    Self {
                        context: Some(context),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "libusb init failed, USB printing disabled");
                    Self { context: None }
                }
            }
        }
        #[cfg(not(feature = "usb"))]
        {
            info!("Built without USB support");
            Self {}
        }
    }

    /// A capability that is always absent (network-only hosts, tests)
    pub fn unavailable() -> Self {
        Self {
            #[cfg(feature = "usb")]
            context: None,
        }
    }

    pub fn is_available(&self) -> bool {
        #[cfg(feature = "usb")]
        {
            self.context.is_some()
        }
        #[cfg(not(feature = "usb"))]
        {
            false
        }
    }

    /// Printer handle for a vendor/product id pair
    pub fn printer(&self, vendor_id: u16, product_id: u16) -> UsbPrinter {
        UsbPrinter {
            support: self.clone(),
            vendor_id,
            product_id,
            timeout: Duration::from_secs(5),
        }
    }

    /// Enumerate attached printers
    pub fn discover(&self) -> UsbDiscovery {
        #[cfg(feature = "usb")]
        {
            match &self.context {
                Some(context) => crate::discovery::discover_usb(&RusbBus::new(context.clone())),
                None => UsbDiscovery::unavailable(),
            }
        }
        #[cfg(not(feature = "usb"))]
        {
            UsbDiscovery::unavailable()
        }
    }
}

impl fmt::Debug for UsbSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsbSupport")
            .field("available", &self.is_available())
            .finish()
    }
}

/// USB printer addressed by vendor/product id
#[derive(Debug, Clone)]
pub struct UsbPrinter {
    support: UsbSupport,
    vendor_id: u16,
    product_id: u16,
    timeout: Duration,
}

impl UsbPrinter {
    /// Set the bulk transfer timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl Printer for UsbPrinter {
    #[instrument(skip(self, data), fields(device = %self.id(), data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        #[cfg(feature = "usb")]
        {
            let context = self
                .support
                .context
                .clone()
                .ok_or(PrintError::UsbUnavailable)?;
            let (vendor_id, product_id, timeout) = (self.vendor_id, self.product_id, self.timeout);
            let data = data.to_vec();

            // libusb transfers block; keep them off the async workers
            tokio::task::spawn_blocking(move || {
                imp::write_bulk(&context, vendor_id, product_id, &data, timeout)
            })
            .await
            .map_err(|e| PrintError::Usb(format!("Task join failed: {}", e)))??;

            info!("Print job sent successfully");
            Ok(())
        }
        #[cfg(not(feature = "usb"))]
        {
            let _ = data;
            Err(PrintError::UsbUnavailable)
        }
    }

    async fn is_online(&self) -> bool {
        #[cfg(feature = "usb")]
        {
            let Some(context) = self.support.context.clone() else {
                return false;
            };
            let (vendor_id, product_id) = (self.vendor_id, self.product_id);
            tokio::task::spawn_blocking(move || {
                matches!(imp::find_device(&context, vendor_id, product_id), Ok(Some(_)))
            })
            .await
            .unwrap_or(false)
        }
        #[cfg(not(feature = "usb"))]
        {
            false
        }
    }
}

#[cfg(feature = "usb")]
pub use imp::RusbBus;

#[cfg(feature = "usb")]
mod imp {
    use std::time::Duration;

    use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};
    use tracing::{debug, warn};

    use crate::discovery::{UsbBus, UsbDeviceSummary, UsbStrings};
    use crate::error::{PrintError, PrintResult};

    fn usb_err(action: &'static str) -> impl Fn(rusb::Error) -> PrintError {
        move |e| PrintError::Usb(format!("{} failed: {}", action, e))
    }

    pub(super) fn find_device(
        context: &Context,
        vendor_id: u16,
        product_id: u16,
    ) -> PrintResult<Option<Device<Context>>> {
        let devices = context.devices().map_err(usb_err("enumerate"))?;
        for device in devices.iter() {
            let Ok(desc) = device.device_descriptor() else {
                continue;
            };
            if desc.vendor_id() == vendor_id && desc.product_id() == product_id {
                return Ok(Some(device));
            }
        }
        Ok(None)
    }

    /// First interface of the active configuration and its bulk OUT endpoint
    fn bulk_out_endpoint(device: &Device<Context>) -> PrintResult<(u8, u8)> {
        let config = device
            .active_config_descriptor()
            .or_else(|_| device.config_descriptor(0))
            .map_err(usb_err("read config descriptor"))?;

        let no_endpoint = || {
            PrintError::NoBulkEndpoint(format!(
                "bus {} address {}",
                device.bus_number(),
                device.address()
            ))
        };

        let interface = config.interfaces().next().ok_or_else(no_endpoint)?;
        for setting in interface.descriptors() {
            for endpoint in setting.endpoint_descriptors() {
                if endpoint.direction() == Direction::Out
                    && endpoint.transfer_type() == TransferType::Bulk
                {
                    return Ok((setting.interface_number(), endpoint.address()));
                }
            }
        }
        Err(no_endpoint())
    }

    /// Claimed interface; released (and the kernel driver re-attached) on drop
    struct ClaimedInterface<'a> {
        handle: &'a DeviceHandle<Context>,
        interface: u8,
        reattach: bool,
    }

    impl<'a> ClaimedInterface<'a> {
        fn claim(handle: &'a DeviceHandle<Context>, interface: u8) -> PrintResult<Self> {
            let mut reattach = false;
            if rusb::supports_detach_kernel_driver()
                && handle.kernel_driver_active(interface).unwrap_or(false)
            {
                handle
                    .detach_kernel_driver(interface)
                    .map_err(usb_err("detach kernel driver"))?;
                reattach = true;
            }

            if let Err(e) = handle.claim_interface(interface) {
                if reattach && let Err(e) = handle.attach_kernel_driver(interface) {
                    warn!(interface, error = %e, "Kernel driver re-attach failed");
                }
                return Err(usb_err("claim interface")(e));
            }

            Ok(Self {
                handle,
                interface,
                reattach,
            })
        }
    }

    impl Drop for ClaimedInterface<'_> {
        fn drop(&mut self) {
            if let Err(e) = self.handle.release_interface(self.interface) {
                warn!(interface = self.interface, error = %e, "Interface release failed");
            }
            if self.reattach
                && let Err(e) = self.handle.attach_kernel_driver(self.interface)
            {
                warn!(interface = self.interface, error = %e, "Kernel driver re-attach failed");
            }
        }
    }

    pub(super) fn write_bulk(
        context: &Context,
        vendor_id: u16,
        product_id: u16,
        data: &[u8],
        timeout: Duration,
    ) -> PrintResult<()> {
        let device = find_device(context, vendor_id, product_id)?.ok_or(
            PrintError::DeviceNotFound {
                vendor_id,
                product_id,
            },
        )?;
        let (interface, endpoint) = bulk_out_endpoint(&device)?;
        debug!(interface, endpoint, "Using bulk OUT endpoint");

        // Handle closes on drop, after the claim guard below is released
        let handle = device.open().map_err(usb_err("open device"))?;
        let claim = ClaimedInterface::claim(&handle, interface)?;

        let written = handle
            .write_bulk(endpoint, data, timeout)
            .map_err(usb_err("bulk transfer"))?;

        drop(claim);

        if written != data.len() {
            return Err(PrintError::IncompleteWrite {
                written,
                expected: data.len(),
            });
        }
        Ok(())
    }

    /// libusb-backed device enumeration for discovery
    pub struct RusbBus {
        context: Context,
    }

    impl RusbBus {
        pub fn new(context: Context) -> Self {
            Self { context }
        }

        fn device_at(&self, bus: u8, address: u8) -> PrintResult<Device<Context>> {
            let devices = self.context.devices().map_err(usb_err("enumerate"))?;
            devices
                .iter()
                .find(|d| d.bus_number() == bus && d.address() == address)
                .ok_or_else(|| PrintError::Usb(format!("device {}:{} went away", bus, address)))
        }
    }

    impl UsbBus for RusbBus {
        fn devices(&self) -> PrintResult<Vec<UsbDeviceSummary>> {
            let devices = self.context.devices().map_err(usb_err("enumerate"))?;
            let mut summaries = Vec::new();

            for device in devices.iter() {
                let Ok(desc) = device.device_descriptor() else {
                    continue;
                };

                // Interface classes matter for composite devices (class 0 at device level)
                let interface_classes = device
                    .active_config_descriptor()
                    .or_else(|_| device.config_descriptor(0))
                    .map(|config| {
                        config
                            .interfaces()
                            .flat_map(|i| i.descriptors().map(|d| d.class_code()).collect::<Vec<_>>())
                            .collect()
                    })
                    .unwrap_or_default();

                summaries.push(UsbDeviceSummary {
                    bus: device.bus_number(),
                    address: device.address(),
                    vendor_id: desc.vendor_id(),
                    product_id: desc.product_id(),
                    device_class: desc.class_code(),
                    interface_classes,
                });
            }
            Ok(summaries)
        }

        fn describe(&self, summary: &UsbDeviceSummary) -> PrintResult<UsbStrings> {
            let device = self.device_at(summary.bus, summary.address)?;
            let desc = device
                .device_descriptor()
                .map_err(usb_err("read device descriptor"))?;
            let handle = device.open().map_err(usb_err("open device"))?;

            Ok(UsbStrings {
                manufacturer: handle.read_manufacturer_string_ascii(&desc).ok(),
                product: handle.read_product_string_ascii(&desc).ok(),
            })
        }
    }
}
