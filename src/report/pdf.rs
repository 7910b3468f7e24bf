//! PDF backend over `printpdf`
//!
//! Uses the three built-in Helvetica faces, so no font data is embedded.

use super::document::{text_width, Align, Cell, Document, DocumentBackend, FontStyle, Rgb};
use super::document::{PAGE_HEIGHT, PAGE_WIDTH};
use crate::error::BotError;
use crate::Result;
use printpdf::path::PaintMode;
use printpdf::{BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfLayerReference, Rect};

const CELL_PADDING: f32 = 1.0;
const MM_PER_POINT: f32 = 25.4 / 72.0;
const LAYER: &str = "Report";

pub struct PdfBackend;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
        }
    }
}

fn render_error<E: std::fmt::Debug>(error: E) -> BotError {
    BotError::RenderError(format!("{:?}", error))
}

impl DocumentBackend for PdfBackend {
    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, document: &Document) -> Result<Vec<u8>> {
        let (first, rest) = document
            .pages
            .split_first()
            .ok_or_else(|| BotError::RenderError("document has no pages".to_string()))?;

        let (pdf, page, layer) =
            PdfDocument::new(document.title.as_str(), Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        let fonts = Fonts {
            regular: pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(render_error)?,
            bold: pdf.add_builtin_font(BuiltinFont::HelveticaBold).map_err(render_error)?,
            italic: pdf.add_builtin_font(BuiltinFont::HelveticaOblique).map_err(render_error)?,
        };

        let layer_ref = pdf.get_page(page).get_layer(layer);
        draw_cells(&layer_ref, &first.cells, &fonts);

        for extra in rest {
            let (page, layer) = pdf.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
            let layer_ref = pdf.get_page(page).get_layer(layer);
            draw_cells(&layer_ref, &extra.cells, &fonts);
        }

        pdf.save_to_bytes().map_err(render_error)
    }
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(printpdf::Rgb::new(
        rgb.0 as f32 / 255.0,
        rgb.1 as f32 / 255.0,
        rgb.2 as f32 / 255.0,
        None,
    ))
}

fn draw_cells(layer: &PdfLayerReference, cells: &[Cell], fonts: &Fonts) {
    layer.set_outline_thickness(0.2);
    for cell in cells {
        draw_cell(layer, cell, fonts);
    }
}

fn draw_cell(layer: &PdfLayerReference, cell: &Cell, fonts: &Fonts) {
    // printpdf measures from the bottom-left corner
    let bottom = PAGE_HEIGHT - cell.y - cell.height;
    let rect = Rect::new(
        Mm(cell.x),
        Mm(bottom),
        Mm(cell.x + cell.width),
        Mm(bottom + cell.height),
    );

    let mode = match (cell.fill, cell.border) {
        (Some(_), true) => Some(PaintMode::FillStroke),
        (Some(_), false) => Some(PaintMode::Fill),
        (None, true) => Some(PaintMode::Stroke),
        (None, false) => None,
    };
    if let Some(mode) = mode {
        if let Some(fill) = cell.fill {
            layer.set_fill_color(color(fill));
        }
        layer.set_outline_color(color(Rgb(0, 0, 0)));
        layer.add_rect(rect.with_mode(mode));
    }

    if cell.text.is_empty() {
        return;
    }

    let width = text_width(&cell.text, cell.size);
    let text_x = match cell.align {
        Align::Left => cell.x + CELL_PADDING,
        Align::Center => cell.x + (cell.width - width) / 2.0,
        Align::Right => cell.x + cell.width - width - CELL_PADDING,
    };
    // Baseline sits a little below the vertical centre of the cell
    let baseline = cell.y + cell.height / 2.0 + 0.3 * cell.size * MM_PER_POINT;

    layer.set_fill_color(color(cell.color));
    layer.use_text(
        cell.text.as_str(),
        cell.size,
        Mm(text_x),
        Mm(PAGE_HEIGHT - baseline),
        fonts.get(cell.font),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;
    use crate::report::document::layout;
    use chrono::{Duration, TimeZone, Utc};

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_renders_pdf_file() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let entries = vec![Entry::from_signed("alice", 14.0, "pot".into(), at)];
        let bytes = PdfBackend.render(&layout(&entries, "alice", &at)).unwrap();

        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, b"%%EOF"));
    }

    #[test]
    fn test_renders_every_page() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let entries: Vec<Entry> = (0..80)
            .map(|i| Entry::from_signed("alice", 1.0, format!("item {}", i), at + Duration::minutes(i)))
            .collect();
        let document = layout(&entries, "alice", &at);
        assert!(document.pages.len() >= 2);

        let one_page = PdfBackend.render(&layout(&entries[..1], "alice", &at)).unwrap();
        let many_pages = PdfBackend.render(&document).unwrap();
        assert!(many_pages.len() > one_page.len());
    }

    #[test]
    fn test_pageless_document_is_rejected() {
        let document = Document {
            title: "empty".into(),
            pages: vec![],
        };
        assert!(matches!(
            PdfBackend.render(&document),
            Err(BotError::RenderError(_))
        ));
    }
}
