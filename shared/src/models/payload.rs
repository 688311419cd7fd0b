//! Typed job payloads
//!
//! The job store keeps payloads as loose JSON. [`JobPayload::decode`] turns a
//! row's payload into the shape its `job_type` requires and validates it, so
//! the renderers never see partial data.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::print_job::JobType;

#[derive(Debug, Error)]
pub enum PayloadError {
    /// JSON does not match the payload shape for the job type
    #[error("Malformed {job_type} payload: {source}")]
    Malformed {
        job_type: JobType,
        #[source]
        source: serde_json::Error,
    },

    /// JSON decoded but the content is unusable
    #[error("Invalid {job_type} payload: {reason}")]
    Invalid { job_type: JobType, reason: String },
}

impl PayloadError {
    fn invalid(job_type: JobType, reason: impl Into<String>) -> Self {
        Self::Invalid {
            job_type,
            reason: reason.into(),
        }
    }
}

/// Kitchen order ticket item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KotItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub portion: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Kitchen order ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KotData {
    #[serde(deserialize_with = "string_or_number")]
    pub bill_id: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub table_number: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub token_number: Option<String>,
    pub items: Vec<KotItem>,
    #[serde(deserialize_with = "string_or_number")]
    pub kot_number: String,
    #[serde(default)]
    pub is_parcel: bool,
}

/// Bill line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl BillItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Customer bill
///
/// Totals are computed upstream; the bill is printed as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillData {
    #[serde(deserialize_with = "string_or_number")]
    pub bill_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub bill_number: String,
    #[serde(default)]
    pub items: Vec<BillItem>,
    pub sub_total: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub cgst_amount: Decimal,
    #[serde(default)]
    pub sgst_amount: Decimal,
    pub final_amount: Decimal,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub table_number: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_address: Option<String>,
    #[serde(default)]
    pub business_phone: Option<String>,
    /// Tax registration id (GSTIN)
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub footer_text: Option<String>,
    #[serde(default = "default_currency")]
    pub currency_symbol: String,
}

fn default_currency() -> String {
    "₹".to_string()
}

/// Test page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub printer_name: Option<String>,
}

/// Decoded payload, discriminated by [`JobType`]
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    Kot(KotData),
    Bill(BillData),
    Test(TestPayload),
}

impl JobPayload {
    /// Decode and validate a raw payload for `job_type`
    pub fn decode(job_type: JobType, raw: &serde_json::Value) -> Result<Self, PayloadError> {
        let malformed = |source| PayloadError::Malformed { job_type, source };

        let payload = match job_type {
            JobType::Kot => JobPayload::Kot(serde_json::from_value(raw.clone()).map_err(malformed)?),
            JobType::Bill => {
                JobPayload::Bill(serde_json::from_value(raw.clone()).map_err(malformed)?)
            }
            JobType::Test => {
                // A test job may carry no payload at all
                if raw.is_null() {
                    JobPayload::Test(TestPayload::default())
                } else {
                    JobPayload::Test(serde_json::from_value(raw.clone()).map_err(malformed)?)
                }
            }
        };

        payload.validate()?;
        Ok(payload)
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::Kot(_) => JobType::Kot,
            JobPayload::Bill(_) => JobType::Bill,
            JobPayload::Test(_) => JobType::Test,
        }
    }

    /// Raw JSON form for storing in a job row
    pub fn to_value(&self) -> serde_json::Value {
        let value = match self {
            JobPayload::Kot(kot) => serde_json::to_value(kot),
            JobPayload::Bill(bill) => serde_json::to_value(bill),
            JobPayload::Test(test) => serde_json::to_value(test),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    fn validate(&self) -> Result<(), PayloadError> {
        match self {
            JobPayload::Kot(kot) => kot.validate(),
            JobPayload::Bill(bill) => bill.validate(),
            JobPayload::Test(_) => Ok(()),
        }
    }
}

impl KotData {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.kot_number.trim().is_empty() {
            return Err(PayloadError::invalid(JobType::Kot, "kotNumber is empty"));
        }
        if self.items.is_empty() {
            return Err(PayloadError::invalid(JobType::Kot, "no items"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(PayloadError::invalid(
                    JobType::Kot,
                    format!("item {} has no name", idx + 1),
                ));
            }
            if item.quantity == 0 {
                return Err(PayloadError::invalid(
                    JobType::Kot,
                    format!("item '{}' has zero quantity", item.name),
                ));
            }
        }
        Ok(())
    }
}

impl BillData {
    fn validate(&self) -> Result<(), PayloadError> {
        if self.bill_number.trim().is_empty() {
            return Err(PayloadError::invalid(JobType::Bill, "billNumber is empty"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.name.trim().is_empty() {
                return Err(PayloadError::invalid(
                    JobType::Bill,
                    format!("item {} has no name", idx + 1),
                ));
            }
            if item.quantity == 0 {
                return Err(PayloadError::invalid(
                    JobType::Bill,
                    format!("item '{}' has zero quantity", item.name),
                ));
            }
            if item.unit_price.is_sign_negative() && !item.unit_price.is_zero() {
                return Err(PayloadError::invalid(
                    JobType::Bill,
                    format!("item '{}' has a negative price", item.name),
                ));
            }
        }
        let amounts = [
            ("subTotal", self.sub_total),
            ("discountAmount", self.discount_amount),
            ("cgstAmount", self.cgst_amount),
            ("sgstAmount", self.sgst_amount),
            ("finalAmount", self.final_amount),
        ];
        if let Some((field, _)) = amounts.iter().find(|(_, v)| v.is_sign_negative() && !v.is_zero()) {
            return Err(PayloadError::invalid(
                JobType::Bill,
                format!("{} is negative", field),
            ));
        }
        Ok(())
    }
}

// ========== Lenient identifier fields ==========

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Int(i64),
    Float(f64),
}

impl From<StringOrNumber> for String {
    fn from(v: StringOrNumber) -> Self {
        match v {
            StringOrNumber::String(s) => s,
            StringOrNumber::Int(n) => n.to_string(),
            StringOrNumber::Float(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    StringOrNumber::deserialize(deserializer).map(String::from)
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?
        .map(String::from)
        .filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_kot() {
        let raw = json!({
            "billId": "b-1",
            "kotNumber": "0007",
            "tableNumber": "T12",
            "items": [{"name": "Veg Biryani", "quantity": 2, "portion": "Full"}]
        });
        let JobPayload::Kot(kot) = JobPayload::decode(JobType::Kot, &raw).unwrap() else {
            panic!("expected KOT payload");
        };
        assert_eq!(kot.kot_number, "0007");
        assert_eq!(kot.table_number.as_deref(), Some("T12"));
        assert!(!kot.is_parcel);
        assert_eq!(kot.items[0].portion.as_deref(), Some("Full"));
    }

    #[test]
    fn test_numeric_identifiers() {
        let raw = json!({
            "billId": 42,
            "kotNumber": 7,
            "tokenNumber": 15,
            "items": [{"name": "Tea", "quantity": 1}]
        });
        let JobPayload::Kot(kot) = JobPayload::decode(JobType::Kot, &raw).unwrap() else {
            panic!("expected KOT payload");
        };
        assert_eq!(kot.bill_id, "42");
        assert_eq!(kot.kot_number, "7");
        assert_eq!(kot.token_number.as_deref(), Some("15"));
    }

    #[test]
    fn test_decode_bill_amounts() {
        let raw = json!({
            "billId": "b-1",
            "billNumber": "INV-12",
            "items": [{"name": "Paneer Tikka", "quantity": 2, "unitPrice": 250}],
            "subTotal": 500,
            "cgstAmount": 12.5,
            "sgstAmount": 12.5,
            "finalAmount": 525
        });
        let JobPayload::Bill(bill) = JobPayload::decode(JobType::Bill, &raw).unwrap() else {
            panic!("expected bill payload");
        };
        assert_eq!(bill.currency_symbol, "₹");
        assert_eq!(bill.items[0].line_total(), Decimal::from(500));
        assert_eq!(bill.cgst_amount, Decimal::new(125, 1));
        assert!(bill.discount_amount.is_zero());
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        // A bill payload submitted as a KOT
        let raw = json!({"billNumber": "INV-1", "subTotal": 1, "finalAmount": 1});
        let err = JobPayload::decode(JobType::Kot, &raw).unwrap_err();
        assert!(matches!(err, PayloadError::Malformed { job_type: JobType::Kot, .. }));
    }

    #[test]
    fn test_empty_kot_is_invalid() {
        let raw = json!({"billId": "b", "kotNumber": "1", "items": []});
        let err = JobPayload::decode(JobType::Kot, &raw).unwrap_err();
        assert!(matches!(err, PayloadError::Invalid { .. }));
        assert!(err.to_string().contains("no items"));
    }

    #[test]
    fn test_zero_quantity_is_invalid() {
        let raw = json!({
            "billId": "b",
            "kotNumber": "1",
            "items": [{"name": "Dal", "quantity": 0}]
        });
        assert!(JobPayload::decode(JobType::Kot, &raw).is_err());
    }

    #[test]
    fn test_test_payload_may_be_null() {
        let payload = JobPayload::decode(JobType::Test, &serde_json::Value::Null).unwrap();
        assert_eq!(payload, JobPayload::Test(TestPayload::default()));
    }

    #[test]
    fn test_to_value_decodes_back() {
        let payload = JobPayload::Test(TestPayload {
            message: Some("hello".into()),
            printer_name: None,
        });
        let decoded = JobPayload::decode(JobType::Test, &payload.to_value()).unwrap();
        assert_eq!(decoded, payload);
    }
}
