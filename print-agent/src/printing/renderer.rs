//! Document renderers
//!
//! Turns decoded job payloads into ESC/POS bytes for a given column budget.
//! Rendering is deterministic: the timestamp comes from the job, not the
//! clock, so the same job renders to the same bytes every time.
//!
//! Text fields that exceed their column are cut, never wrapped. Monetary
//! values are padded but never cut.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crab_printer::text::{fit, pad_start, text_width, truncate};
use crab_printer::{CharScale, EscPosBuilder};
use rust_decimal::Decimal;
use shared::models::{BillData, JobPayload, KotData, TestPayload};
use tracing::instrument;

/// Lines fed before the cut so the last line clears the cutter
const FEED_BEFORE_CUT: u8 = 4;

/// Layout inputs shared by every renderer
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Column budget (see `PaperFormat::columns`)
    pub width: usize,
    /// Printed as the document time
    pub timestamp: DateTime<Utc>,
    pub timezone: Tz,
}

impl RenderOptions {
    pub fn new(width: usize, timestamp: DateTime<Utc>, timezone: Tz) -> Self {
        Self {
            width,
            timestamp,
            timezone,
        }
    }

    fn formatted_time(&self) -> String {
        self.timestamp
            .with_timezone(&self.timezone)
            .format("%d/%m/%Y %H:%M")
            .to_string()
    }
}

/// Render any payload to printer bytes
#[instrument(skip_all, fields(job_type = %payload.job_type(), width = options.width))]
pub fn encode(payload: &JobPayload, options: &RenderOptions) -> Vec<u8> {
    match payload {
        JobPayload::Kot(kot) => KotRenderer::new(options).render(kot),
        JobPayload::Bill(bill) => BillRenderer::new(options).render(bill),
        JobPayload::Test(test) => TestPageRenderer::new(options).render(test),
    }
}

/// Portions that need no continuation line on a KOT (case-insensitive)
const DEFAULT_PORTIONS: &[&str] = &["regular", "single", "default"];

fn is_default_portion(portion: &str) -> bool {
    DEFAULT_PORTIONS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(portion))
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Kitchen order ticket renderer
///
/// ```text
///        KITCHEN ORDER
///          KOT #0007
///         Table: T12
///      16/10/2026 19:30
/// ================================
/// Qty Item
/// --------------------------------
///   2 Veg Biryani
///     [Full]
///     Note: less spicy
/// ================================
/// ```
pub struct KotRenderer<'a> {
    options: &'a RenderOptions,
}

impl<'a> KotRenderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, kot: &KotData) -> Vec<u8> {
        let width = self.options.width;
        let mut b = EscPosBuilder::new(width);

        self.render_header(&mut b, kot);

        b.left();
        b.sep_double();
        b.bold();
        b.line_fit("Qty Item");
        b.bold_off();
        b.sep_single();

        for item in &kot.items {
            let qty = pad_start(&item.quantity.to_string(), 3);
            let name_budget = width.saturating_sub(text_width(&qty) + 1);
            b.bold();
            b.line(&format!("{} {}", qty, truncate(item.name.trim(), name_budget)));
            b.bold_off();

            // Continuation lines are indented under the item name
            let indent = " ".repeat(text_width(&qty) + 1);
            if let Some(portion) = item
                .portion
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty() && !is_default_portion(p))
            {
                b.line_fit(&format!("{}[{}]", indent, portion));
            }
            if let Some(notes) = item.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                b.line_fit(&format!("{}Note: {}", indent, notes));
            }
        }

        b.sep_double();
        b.line_fit(&format!("Items: {}", kot.items.len()));
        b.feed(FEED_BEFORE_CUT);
        b.cut();
        b.build()
    }

    fn render_header(&self, b: &mut EscPosBuilder, kot: &KotData) {
        let width = self.options.width;

        b.center();
        b.scale(CharScale::DoubleBoth);
        b.bold();
        b.line(&truncate("KITCHEN ORDER", CharScale::DoubleBoth.columns(width)));
        b.reset_size();

        b.scale(CharScale::DoubleHeight);
        b.line_fit(&format!("KOT #{}", kot.kot_number.trim()));
        if kot.is_parcel {
            b.line_fit("** PARCEL **");
        }
        b.reset_size();
        b.bold_off();

        if let Some(table) = &kot.table_number {
            b.line_fit(&format!("Table: {}", table));
        }
        if let Some(token) = &kot.token_number {
            b.line_fit(&format!("Token: {}", token));
        }
        b.line_fit(&self.options.formatted_time());
    }
}

/// Customer bill renderer
///
/// The item table splits the width into a name column of `width - 20`
/// followed by quantity (4), unit price (8) and line total (8).
pub struct BillRenderer<'a> {
    options: &'a RenderOptions,
}

/// Quantity, unit price and line total columns
const QTY_COL: usize = 4;
const PRICE_COL: usize = 8;
const AMOUNT_COL: usize = 8;
const TOTALS_VALUE_COL: usize = 10;

impl<'a> BillRenderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    fn name_col(&self) -> usize {
        self.options
            .width
            .saturating_sub(QTY_COL + PRICE_COL + AMOUNT_COL)
    }

    pub fn render(&self, bill: &BillData) -> Vec<u8> {
        let mut b = EscPosBuilder::new(self.options.width);

        self.render_business_header(&mut b, bill);

        b.left();
        b.sep_double();
        b.line_lr(&format!("Bill: {}", bill.bill_number), &self.options.formatted_time());
        if let Some(table) = &bill.table_number {
            b.line_fit(&format!("Table: {}", table));
        }

        self.render_items(&mut b, bill);
        self.render_totals(&mut b, bill);

        if let Some(method) = bill.payment_method.as_deref().filter(|m| !m.trim().is_empty()) {
            b.line_fit(&format!("Payment: {}", method.trim()));
        }

        b.sep_single();
        b.center();
        let footer = bill
            .footer_text
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or("Thank you! Visit again");
        for line in footer.lines() {
            b.line_fit(line.trim());
        }
        b.left();

        b.feed(FEED_BEFORE_CUT);
        b.cut();
        b.build()
    }

    fn render_business_header(&self, b: &mut EscPosBuilder, bill: &BillData) {
        b.center();

        if let Some(name) = &bill.business_name {
            b.bold();
            b.double_height();
            b.line_fit(name.trim());
            b.reset_size();
            b.bold_off();
        }
        if let Some(address) = &bill.business_address {
            for line in address.lines().map(str::trim).filter(|l| !l.is_empty()) {
                b.line_fit(line);
            }
        }
        if let Some(phone) = &bill.business_phone {
            b.line_fit(&format!("Ph: {}", phone.trim()));
        }
        if let Some(gst) = &bill.gst_number {
            b.line_fit(&format!("GSTIN: {}", gst.trim()));
        }
    }

    fn item_row(&self, name: &str, qty: &str, price: &str, amount: &str) -> String {
        format!(
            "{}{}{}{}",
            fit(name, self.name_col(), false),
            pad_start(qty, QTY_COL),
            pad_start(price, PRICE_COL),
            pad_start(amount, AMOUNT_COL)
        )
    }

    fn render_items(&self, b: &mut EscPosBuilder, bill: &BillData) {
        b.sep_single();
        b.bold();
        b.line(&self.item_row("Item", "Qty", "Price", "Amount"));
        b.bold_off();
        b.sep_single();

        for item in &bill.items {
            b.line(&self.item_row(
                item.name.trim(),
                &item.quantity.to_string(),
                &money(item.unit_price),
                &money(item.line_total()),
            ));
        }
        b.sep_single();
    }

    /// Right-aligned `label value` row
    fn totals_row(&self, label: &str, value: &str) -> String {
        pad_start(
            &format!("{} {}", label, pad_start(value, TOTALS_VALUE_COL)),
            self.options.width,
        )
    }

    fn render_totals(&self, b: &mut EscPosBuilder, bill: &BillData) {
        b.line(&self.totals_row("Subtotal:", &money(bill.sub_total)));
        b.line(&self.totals_row("CGST:", &money(bill.cgst_amount)));
        b.line(&self.totals_row("SGST:", &money(bill.sgst_amount)));
        if !bill.discount_amount.is_zero() {
            b.line(&self.totals_row(
                "Discount:",
                &format!("-{}", money(bill.discount_amount)),
            ));
        }

        b.sep_double();
        b.bold();
        b.double_height();
        b.line_lr(
            "TOTAL",
            &format!("{}{}", bill.currency_symbol, money(bill.final_amount)),
        );
        b.reset_size();
        b.bold_off();
    }
}

/// Test page renderer
///
/// Exercises alignment, emphasis and scale so a technician can check a
/// freshly configured printer at a glance.
pub struct TestPageRenderer<'a> {
    options: &'a RenderOptions,
}

impl<'a> TestPageRenderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, test: &TestPayload) -> Vec<u8> {
        let width = self.options.width;
        let mut b = EscPosBuilder::new(width);

        b.center();
        b.double_size();
        b.bold();
        b.line(&truncate("TEST PRINT", CharScale::DoubleBoth.columns(width)));
        b.reset_size();
        b.bold_off();

        if let Some(name) = &test.printer_name {
            b.line_fit(&format!("Printer: {}", name));
        }
        b.line_fit(&self.options.formatted_time());
        b.line_fit(&format!("Width: {} columns", width));

        b.left();
        b.sep_double();
        let ruler: String = "1234567890".chars().cycle().take(width).collect();
        b.line(&ruler);
        b.sep_single();

        b.left().line("Left");
        b.center().line("Center");
        b.right().line("Right");
        b.left();
        b.bold().line("Bold").bold_off();
        b.underline().line("Underline").underline_off();
        b.double_height().line("Double height").reset_size();

        b.sep_single();
        let message = test
            .message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("Printer is working correctly");
        b.center();
        b.line_fit(message);
        b.left();

        b.feed(FEED_BEFORE_CUT);
        b.cut();
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crab_printer::commands;
    use shared::models::{BillItem, JobType, KotItem};

    fn options(width: usize) -> RenderOptions {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 14, 0, 0).unwrap();
        RenderOptions::new(width, at, chrono_tz::Asia::Kolkata)
    }

    /// Strip ESC/GS commands and return the printable text lines
    fn text_lines(data: &[u8]) -> Vec<String> {
        let mut text = Vec::with_capacity(data.len());
        let mut i = 0;
        while i < data.len() {
            match data[i] {
                0x1B => {
                    let args = match data.get(i + 1) {
                        Some(b'@') => 0,
                        Some(b'p') => 3,
                        _ => 1,
                    };
                    i += 2 + args;
                }
                0x1D => i += 3,
                byte => {
                    text.push(byte);
                    i += 1;
                }
            }
        }
        String::from_utf8(text)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn scenario_a() -> KotData {
        KotData {
            bill_id: "b-1".into(),
            table_number: Some("T12".into()),
            token_number: None,
            items: vec![KotItem {
                name: "Veg Biryani".into(),
                quantity: 2,
                portion: Some("Full".into()),
                notes: None,
            }],
            kot_number: "0007".into(),
            is_parcel: false,
        }
    }

    fn scenario_b() -> BillData {
        BillData {
            bill_id: "b-1".into(),
            bill_number: "INV-12".into(),
            items: vec![
                BillItem {
                    name: "Paneer Tikka".into(),
                    quantity: 1,
                    unit_price: Decimal::from(300),
                },
                BillItem {
                    name: "Butter Naan".into(),
                    quantity: 4,
                    unit_price: Decimal::from(50),
                },
            ],
            sub_total: Decimal::from(500),
            discount_amount: Decimal::ZERO,
            cgst_amount: Decimal::new(125, 1),
            sgst_amount: Decimal::new(125, 1),
            final_amount: Decimal::from(525),
            payment_method: Some("UPI".into()),
            table_number: Some("T12".into()),
            business_name: Some("Spice Route".into()),
            business_address: Some("MG Road, Bengaluru".into()),
            business_phone: None,
            gst_number: Some("29ABCDE1234F1Z5".into()),
            footer_text: None,
            currency_symbol: "₹".into(),
        }
    }

    #[test]
    fn test_kot_layout() {
        let data = KotRenderer::new(&options(48)).render(&scenario_a());
        let lines = text_lines(&data);

        assert!(data.starts_with(&commands::INIT));
        assert!(data.ends_with(&commands::FULL_CUT));
        assert!(lines.iter().any(|l| l.contains("KOT #0007")));
        assert!(lines.iter().any(|l| l.contains("Table: T12")));

        let item_idx = lines
            .iter()
            .position(|l| l.contains("Veg Biryani"))
            .expect("item line");
        assert!(lines[item_idx].trim_start().starts_with('2'));
        assert!(lines[item_idx + 1].contains("[Full]"));
    }

    #[test]
    fn test_default_portion_has_no_continuation_line() {
        let mut kot = scenario_a();
        kot.items[0].portion = Some("Regular".into());
        kot.items.push(KotItem {
            name: "Lassi".into(),
            quantity: 1,
            portion: Some("HALF".into()),
            notes: None,
        });

        let lines = text_lines(&KotRenderer::new(&options(32)).render(&kot));
        let item_idx = lines.iter().position(|l| l.contains("Veg Biryani")).unwrap();
        assert!(lines[item_idx + 1].contains("Lassi"));
        assert!(!lines.iter().any(|l| l.contains("[Regular]")));
        assert!(lines.iter().any(|l| l.contains("[HALF]")));
    }

    #[test]
    fn test_kot_notes_and_parcel() {
        let mut kot = scenario_a();
        kot.is_parcel = true;
        kot.table_number = None;
        kot.token_number = Some("15".into());
        kot.items[0].portion = None;
        kot.items[0].notes = Some("less spicy".into());

        let lines = text_lines(&KotRenderer::new(&options(32)).render(&kot));
        assert!(lines.iter().any(|l| l.contains("PARCEL")));
        assert!(lines.iter().any(|l| l.contains("Token: 15")));
        assert!(!lines.iter().any(|l| l.contains("Table:")));

        let item_idx = lines.iter().position(|l| l.contains("Veg Biryani")).unwrap();
        assert!(lines[item_idx + 1].contains("Note: less spicy"));
        assert!(!lines.iter().any(|l| l.contains('[')));
    }

    #[test]
    fn test_bill_totals() {
        let lines = text_lines(&BillRenderer::new(&options(48)).render(&scenario_b()));

        let total = lines.iter().find(|l| l.starts_with("TOTAL")).unwrap();
        assert!(total.ends_with("₹525.00"));

        let cgst = lines.iter().find(|l| l.contains("CGST:")).unwrap();
        assert!(cgst.ends_with("12.50"));
        let sgst = lines.iter().find(|l| l.contains("SGST:")).unwrap();
        assert!(sgst.ends_with("12.50"));

        assert!(lines.iter().any(|l| l.contains("GSTIN: 29ABCDE1234F1Z5")));
        assert!(lines.iter().any(|l| l.contains("Payment: UPI")));
        // Zero discount is not printed
        assert!(!lines.iter().any(|l| l.contains("Discount")));
    }

    #[test]
    fn test_bill_item_columns() {
        let lines = text_lines(&BillRenderer::new(&options(48)).render(&scenario_b()));
        let row = lines.iter().find(|l| l.starts_with("Butter Naan")).unwrap();

        // name (28) + qty (4) + price (8) + amount (8)
        assert_eq!(text_width(row), 48);
        assert_eq!(&row[28..32], "   4");
        assert_eq!(&row[32..40], "   50.00");
        assert_eq!(&row[40..48], "  200.00");
    }

    #[test]
    fn test_discount_printed_when_nonzero() {
        let mut bill = scenario_b();
        bill.discount_amount = Decimal::new(2550, 2);
        let lines = text_lines(&BillRenderer::new(&options(32)).render(&bill));
        let discount = lines.iter().find(|l| l.contains("Discount:")).unwrap();
        assert!(discount.ends_with("-25.50"));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let opts = options(48);
        let kot = JobPayload::Kot(scenario_a());
        let bill = JobPayload::Bill(scenario_b());

        assert_eq!(encode(&kot, &opts), encode(&kot, &opts));
        assert_eq!(encode(&bill, &opts), encode(&bill, &opts));
    }

    #[test]
    fn test_width_changes_padding_not_values() {
        let bill = JobPayload::Bill(scenario_b());
        let narrow = text_lines(&encode(&bill, &options(32)));
        let wide = text_lines(&encode(&bill, &options(48)));

        assert_ne!(narrow, wide);

        let numbers = |lines: &[String]| -> Vec<String> {
            lines
                .iter()
                .flat_map(|l| l.split_whitespace())
                .map(|t| t.trim_start_matches('₹').trim_start_matches('-').to_string())
                .filter(|t| t.parse::<Decimal>().is_ok())
                .collect()
        };
        assert_eq!(numbers(&narrow), numbers(&wide));
        assert!(numbers(&wide).contains(&"525.00".to_string()));
    }

    #[test]
    fn test_long_names_are_cut_not_wrapped() {
        let long_name = "A".repeat(60);

        let mut kot = scenario_a();
        kot.items[0].name = long_name.clone();
        kot.items[0].notes = Some("N".repeat(60));
        let kot_lines = text_lines(&KotRenderer::new(&options(32)).render(&kot));

        let mut bill = scenario_b();
        bill.items[0].name = long_name;
        let bill_lines = text_lines(&BillRenderer::new(&options(32)).render(&bill));

        for line in kot_lines.iter().chain(&bill_lines) {
            assert!(text_width(line) <= 32, "line too wide: {:?}", line);
        }
        // Cut, not wrapped: the remainder never shows up on its own line
        let kot_item_lines = kot_lines.iter().filter(|l| l.contains("AAAA")).count();
        assert_eq!(kot_item_lines, 1);
    }

    #[test]
    fn test_amounts_are_never_cut() {
        let mut bill = scenario_b();
        bill.items[0].unit_price = Decimal::new(123456789, 2);
        let lines = text_lines(&BillRenderer::new(&options(32)).render(&bill));
        assert!(lines.iter().any(|l| l.contains("1234567.89")));
    }

    #[test]
    fn test_timestamp_uses_job_time_in_timezone() {
        let lines = text_lines(&KotRenderer::new(&options(48)).render(&scenario_a()));
        // 14:00 UTC is 19:30 in Kolkata
        assert!(lines.iter().any(|l| l.contains("16/10/2026 19:30")));
    }

    #[test]
    fn test_test_page() {
        let payload = JobPayload::decode(
            JobType::Test,
            &serde_json::json!({"printerName": "Counter"}),
        )
        .unwrap();
        let data = encode(&payload, &options(32));
        let lines = text_lines(&data);

        assert!(lines.iter().any(|l| l.contains("TEST PRINT")));
        assert!(lines.iter().any(|l| l.contains("Printer: Counter")));
        assert!(lines.iter().any(|l| l.contains("Printer is working correctly")));
        assert!(lines.iter().any(|l| l == "12345678901234567890123456789012"));
        assert!(data.ends_with(&commands::FULL_CUT));
    }
}
