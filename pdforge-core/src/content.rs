//! Content stream construction
//!
//! Builds the operator byte streams drawn on pages: positioned text,
//! graphics-state save/restore, rotation transforms, fill alpha, and
//! automatic pagination driven by a running vertical cursor. The builder
//! also accumulates the Font/ExtGState resource dictionary its operators
//! refer to.

use crate::objects::{PdfDictionary, PdfName, PdfValue};
use std::fmt::Write;

/// The standard Type 1 fonts this engine writes. They are available in
/// every PDF reader and need no embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    Courier,
    CourierBold,
}

impl Font {
    /// The BaseFont name used in font resources
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Font::Helvetica => "Helvetica",
            Font::HelveticaBold => "Helvetica-Bold",
            Font::HelveticaOblique => "Helvetica-Oblique",
            Font::TimesRoman => "Times-Roman",
            Font::TimesBold => "Times-Bold",
            Font::TimesItalic => "Times-Italic",
            Font::Courier => "Courier",
            Font::CourierBold => "Courier-Bold",
        }
    }

    /// Parse a BaseFont name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Helvetica" => Some(Font::Helvetica),
            "Helvetica-Bold" => Some(Font::HelveticaBold),
            "Helvetica-Oblique" => Some(Font::HelveticaOblique),
            "Times-Roman" => Some(Font::TimesRoman),
            "Times-Bold" => Some(Font::TimesBold),
            "Times-Italic" => Some(Font::TimesItalic),
            "Courier" => Some(Font::Courier),
            "Courier-Bold" => Some(Font::CourierBold),
            _ => None,
        }
    }
}

/// Builder for page content operator streams.
///
/// Text drawing goes through the current font and size; `write_line`
/// advances a vertical cursor and emits a page break whenever the cursor
/// crosses the bottom margin, resetting to the top margin.
pub struct ContentStreamBuilder {
    pages: Vec<String>,
    current: String,
    height: f64,
    bottom_margin: f64,
    top_reset: f64,
    cursor_y: f64,
    leading: f64,
    font: Font,
    font_size: f64,
    fonts: Vec<Font>,
    alphas: Vec<f64>,
    resource_prefix: String,
}

impl ContentStreamBuilder {
    pub fn new(_width: f64, height: f64) -> Self {
        Self {
            pages: Vec::new(),
            current: String::new(),
            height,
            bottom_margin: 50.0,
            top_reset: height - 50.0,
            cursor_y: height - 50.0,
            leading: 20.0,
            font: Font::Helvetica,
            font_size: 12.0,
            fonts: Vec::new(),
            alphas: Vec::new(),
            resource_prefix: String::new(),
        }
    }

    /// Prefix generated resource names (e.g. `Wm` gives `/WmF1`), keeping
    /// overlay operators clear of names target pages are likely to use
    pub fn with_resource_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.resource_prefix = prefix.into();
        self
    }

    pub fn set_margins(&mut self, bottom: f64, top_reset: f64) -> &mut Self {
        self.bottom_margin = bottom;
        self.top_reset = top_reset;
        self
    }

    pub fn set_font(&mut self, font: Font, size: f64) -> &mut Self {
        self.font = font;
        self.font_size = size;
        self
    }

    pub fn set_leading(&mut self, leading: f64) -> &mut Self {
        self.leading = leading;
        self
    }

    /// Move the vertical cursor to an absolute position
    pub fn set_cursor(&mut self, y: f64) -> &mut Self {
        self.cursor_y = y;
        self
    }

    pub fn cursor(&self) -> f64 {
        self.cursor_y
    }

    pub fn save_state(&mut self) -> &mut Self {
        self.current.push_str("q\n");
        self
    }

    pub fn restore_state(&mut self) -> &mut Self {
        self.current.push_str("Q\n");
        self
    }

    /// Rotate the coordinate system about the origin
    pub fn rotate(&mut self, degrees: f64) -> &mut Self {
        let radians = degrees.to_radians();
        let (sin, cos) = (radians.sin(), radians.cos());
        writeln!(
            &mut self.current,
            "{:.6} {:.6} {:.6} {:.6} 0 0 cm",
            cos, sin, -sin, cos
        )
        .unwrap();
        self
    }

    pub fn translate(&mut self, tx: f64, ty: f64) -> &mut Self {
        writeln!(&mut self.current, "1 0 0 1 {tx:.2} {ty:.2} cm").unwrap();
        self
    }

    /// Set the fill alpha through a generated ExtGState resource
    pub fn set_fill_alpha(&mut self, alpha: f64) -> &mut Self {
        let alpha = alpha.clamp(0.0, 1.0);
        let index = match self.alphas.iter().position(|&a| a == alpha) {
            Some(i) => i,
            None => {
                self.alphas.push(alpha);
                self.alphas.len() - 1
            }
        };
        let prefix = &self.resource_prefix;
        writeln!(&mut self.current, "/{prefix}GS{} gs", index + 1).unwrap();
        self
    }

    /// Draw text at a position using the current font and size
    pub fn draw_text(&mut self, x: f64, y: f64, text: &str) -> &mut Self {
        let ops = self.text_ops(self.font, self.font_size, x, y, text);
        self.current.push_str(&ops);
        self
    }

    /// Draw one body line at the cursor, breaking the page first when the
    /// cursor has crossed the bottom margin
    pub fn write_line(&mut self, x: f64, text: &str) -> &mut Self {
        if self.cursor_y < self.bottom_margin {
            self.show_page();
        }
        let y = self.cursor_y;
        self.draw_text(x, y, text);
        self.cursor_y -= self.leading;
        self
    }

    /// End the current page and reset the cursor to the top margin
    pub fn show_page(&mut self) -> &mut Self {
        self.pages.push(std::mem::take(&mut self.current));
        self.cursor_y = self.top_reset;
        self
    }

    /// Pages produced so far, counting the one being built
    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    /// Append a text draw to an already-emitted page (or the current one).
    /// This is how per-page labels get each page's own number after the
    /// total is known.
    pub fn draw_text_on_page(
        &mut self,
        page_index: usize,
        font: Font,
        size: f64,
        x: f64,
        y: f64,
        text: &str,
    ) {
        let ops = self.text_ops(font, size, x, y, text);
        if page_index < self.pages.len() {
            self.pages[page_index].push_str(&ops);
        } else {
            self.current.push_str(&ops);
        }
    }

    fn text_ops(&mut self, font: Font, size: f64, x: f64, y: f64, text: &str) -> String {
        let name = self.font_resource_name(font);
        let mut ops = String::new();
        ops.push_str("BT\n");
        writeln!(&mut ops, "/{name} {size:.2} Tf").unwrap();
        writeln!(&mut ops, "{x:.2} {y:.2} Td").unwrap();
        ops.push('(');
        for ch in text.chars() {
            let byte = if (ch as u32) < 256 { ch as u32 as u8 } else { b'?' };
            match byte {
                b'(' => ops.push_str("\\("),
                b')' => ops.push_str("\\)"),
                b'\\' => ops.push_str("\\\\"),
                b'\n' => ops.push_str("\\n"),
                b'\r' => ops.push_str("\\r"),
                b'\t' => ops.push_str("\\t"),
                0x20..=0x7E => ops.push(byte as char),
                _ => write!(&mut ops, "\\{byte:03o}").unwrap(),
            }
        }
        ops.push_str(") Tj\n");
        ops.push_str("ET\n");
        ops
    }

    fn font_resource_name(&mut self, font: Font) -> String {
        let index = match self.fonts.iter().position(|&f| f == font) {
            Some(i) => i,
            None => {
                self.fonts.push(font);
                self.fonts.len() - 1
            }
        };
        format!("{}F{}", self.resource_prefix, index + 1)
    }

    /// The Font/ExtGState dictionary matching the generated operators
    pub fn resources(&self) -> PdfDictionary {
        let mut resources = PdfDictionary::new();

        if !self.fonts.is_empty() {
            let mut font_dict = PdfDictionary::new();
            for (i, font) in self.fonts.iter().enumerate() {
                let mut entry = PdfDictionary::new();
                entry.insert("Type", PdfValue::Name(PdfName::new("Font")));
                entry.insert("Subtype", PdfValue::Name(PdfName::new("Type1")));
                entry.insert("BaseFont", PdfValue::Name(PdfName::new(font.pdf_name())));
                font_dict.insert(
                    format!("{}F{}", self.resource_prefix, i + 1),
                    PdfValue::Dictionary(entry),
                );
            }
            resources.insert("Font", PdfValue::Dictionary(font_dict));
        }

        if !self.alphas.is_empty() {
            let mut gs_dict = PdfDictionary::new();
            for (i, alpha) in self.alphas.iter().enumerate() {
                let mut entry = PdfDictionary::new();
                entry.insert("Type", PdfValue::Name(PdfName::new("ExtGState")));
                entry.insert("ca", PdfValue::Real(*alpha));
                entry.insert("CA", PdfValue::Real(*alpha));
                gs_dict.insert(
                    format!("{}GS{}", self.resource_prefix, i + 1),
                    PdfValue::Dictionary(entry),
                );
            }
            resources.insert("ExtGState", PdfValue::Dictionary(gs_dict));
        }

        resources
    }

    /// Finish a single-stream build (overlays)
    pub fn finish_single(self) -> Vec<u8> {
        self.current.into_bytes()
    }

    /// Finish a paginated build: all completed pages plus the current one
    pub fn finish_pages(mut self) -> Vec<Vec<u8>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            let last = std::mem::take(&mut self.current);
            self.pages.push(last);
        }
        self.pages.into_iter().map(String::into_bytes).collect()
    }
}
