//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use crab_printer::{PrintError, PrintResult};
use print_agent::printing::PrintSink;
use shared::models::{
    JobType, PaperFormat, PrintJob, PrinterConfig, PrinterRole, PrinterType,
};

/// Print sink that records every send instead of touching hardware
#[derive(Default)]
pub struct FakeSink {
    sends: AtomicUsize,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl FakeSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every send takes `delay`
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    /// Every send fails with a connection error
    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(message.to_string()),
            ..Self::default()
        })
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// (printer name, bytes) per send, in order
    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Printable text of the nth send
    pub fn sent_text(&self, index: usize) -> String {
        String::from_utf8_lossy(&self.sent()[index].1).into_owned()
    }
}

#[async_trait]
impl PrintSink for FakeSink {
    async fn check(&self, _printer: &PrinterConfig) -> PrintResult<()> {
        Ok(())
    }

    async fn send(&self, printer: &PrinterConfig, data: &[u8]) -> PrintResult<()> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(PrintError::Connection(message.clone()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((printer.name.clone(), data.to_vec()));
        Ok(())
    }

    fn usb_available(&self) -> bool {
        false
    }
}

pub fn network_printer(name: &str, role: PrinterRole, format: PaperFormat) -> PrinterConfig {
    PrinterConfig {
        id: name.to_lowercase(),
        name: name.to_string(),
        printer_type: PrinterType::Network,
        vendor_id: None,
        product_id: None,
        ip_address: Some("192.168.1.50".into()),
        port: None,
        role,
        format,
        is_default: true,
        is_active: true,
    }
}

pub fn kot_job(kot_number: &str) -> PrintJob {
    PrintJob::new(
        JobType::Kot,
        PrinterRole::Kitchen,
        serde_json::json!({
            "billId": "bill-1",
            "kotNumber": kot_number,
            "tableNumber": "T4",
            "items": [
                {"name": "Paneer Tikka", "quantity": 2},
                {"name": "Butter Naan", "quantity": 4, "notes": "less butter"}
            ]
        }),
    )
}

pub fn bill_job() -> PrintJob {
    PrintJob::new(
        JobType::Bill,
        PrinterRole::Counter,
        serde_json::json!({
            "billId": "bill-1",
            "billNumber": "1042",
            "items": [
                {"name": "Paneer Tikka", "quantity": 2, "unitPrice": "240.00"},
                {"name": "Butter Naan", "quantity": 4, "unitPrice": "45.00"}
            ],
            "subTotal": "660.00",
            "cgstAmount": "16.50",
            "sgstAmount": "16.50",
            "finalAmount": "693.00",
            "paymentMethod": "UPI"
        }),
    )
}

/// Poll until `check` holds or a second passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
