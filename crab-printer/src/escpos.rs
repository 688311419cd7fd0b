//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::text::{text_width, truncate};

/// Raw command sequences, for callers that send bytes directly
pub mod commands {
    /// ESC @ - Initialize printer
    pub const INIT: [u8; 2] = [0x1B, 0x40];
    /// GS V 0 - Full cut
    pub const FULL_CUT: [u8; 3] = [0x1D, 0x56, 0x00];
    /// ESC p 0 25 250 - Pulse drawer kick connector pin 2
    pub const DRAWER_KICK: [u8; 5] = [0x1B, 0x70, 0x00, 25, 250];
    /// ESC p 1 25 250 - Pulse drawer kick connector pin 5
    pub const DRAWER_KICK_PIN5: [u8; 5] = [0x1B, 0x70, 0x01, 25, 250];
}

/// Drawer kick connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawerPin {
    #[default]
    Pin2,
    Pin5,
}

impl DrawerPin {
    /// Pin by its connector number (2 or 5)
    pub fn from_number(pin: u8) -> Option<Self> {
        match pin {
            2 => Some(DrawerPin::Pin2),
            5 => Some(DrawerPin::Pin5),
            _ => None,
        }
    }

    pub fn command(self) -> [u8; 5] {
        match self {
            DrawerPin::Pin2 => commands::DRAWER_KICK,
            DrawerPin::Pin5 => commands::DRAWER_KICK_PIN5,
        }
    }
}

/// Character scale selected with GS !
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharScale {
    Normal,
    DoubleHeight,
    DoubleWidth,
    DoubleBoth,
}

impl CharScale {
    fn code(self) -> u8 {
        match self {
            CharScale::Normal => 0x00,
            CharScale::DoubleHeight => 0x01,
            CharScale::DoubleWidth => 0x10,
            CharScale::DoubleBoth => 0x11,
        }
    }

    /// Columns available per line at this scale
    pub fn columns(self, width: usize) -> usize {
        match self {
            CharScale::DoubleWidth | CharScale::DoubleBoth => width / 2,
            CharScale::Normal | CharScale::DoubleHeight => width,
        }
    }
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. Text is written
/// as UTF-8; the builder never reflows it.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 76mm paper: 42 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(2048);
        buf.extend_from_slice(&commands::INIT);
        Self { buf, width }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write raw text
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write text cut to the paper width, followed by newline
    pub fn line_fit(&mut self, s: &str) -> &mut Self {
        let cut = truncate(s, self.width);
        self.line(&cut)
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        // ESC d n
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    // === Alignment ===

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x02]);
        self
    }

    // === Text Style ===

    /// Enable bold text
    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    /// Disable bold text
    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Enable single underline
    pub fn underline(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x01]);
        self
    }

    /// Disable underline
    pub fn underline_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x2D, 0x00]);
        self
    }

    /// Select character scale
    pub fn scale(&mut self, scale: CharScale) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, scale.code()]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.scale(CharScale::DoubleBoth)
    }

    /// Double height only
    pub fn double_height(&mut self) -> &mut Self {
        self.scale(CharScale::DoubleHeight)
    }

    /// Double width only
    pub fn double_width(&mut self) -> &mut Self {
        self.scale(CharScale::DoubleWidth)
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.scale(CharScale::Normal)
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned, with spaces
    /// filling the gap. When both do not fit, the left text is cut so the
    /// line stays within the paper width.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let right = truncate(right, self.width);
        let rw = text_width(&right);
        let lw = text_width(left);

        if lw + rw + 1 > self.width {
            let budget = self.width.saturating_sub(rw + 1);
            let left = truncate(left, budget);
            let spaces = self.width - text_width(&left) - rw;
            self.text(&left);
            self.text(&" ".repeat(spaces));
            self.line(&right);
        } else {
            let spaces = self.width - lw - rw;
            self.text(left);
            self.text(&" ".repeat(spaces));
            self.line(&right);
        }
        self
    }

    // === Paper Control ===

    /// Cut paper (full cut)
    pub fn cut(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&commands::FULL_CUT);
        self
    }

    // === Cash Drawer ===

    /// Open cash drawer (pin 2)
    pub fn open_drawer(&mut self) -> &mut Self {
        self.open_drawer_on(DrawerPin::Pin2)
    }

    pub fn open_drawer_on(&mut self, pin: DrawerPin) -> &mut Self {
        self.buf.extend_from_slice(&pin.command());
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Build the final byte buffer
    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}

/// Wrap plain text into a printable job: init, text, feed and cut
pub fn plain_text_job(text: &str, feed_lines: u8) -> Vec<u8> {
    let mut b = EscPosBuilder::default();
    b.text(text);
    if !text.ends_with('\n') {
        b.newline();
    }
    b.feed(feed_lines).cut();
    b.build()
}
