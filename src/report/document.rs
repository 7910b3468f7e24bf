//! Paginated document layout
//!
//! Lays the ledger out on A4 pages as positioned cells (millimetres, origin
//! top-left). A [`DocumentBackend`] turns the layout into file bytes.

use super::{display_time, signed_amount, Totals};
use crate::models::{Entry, ReportFile};
use crate::Result;
use chrono::{DateTime, Utc};

pub const PAGE_WIDTH: f32 = 210.0;
pub const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 10.0;
/// Rows may not extend past this line; the footer lives below it
const BREAK_Y: f32 = PAGE_HEIGHT - 20.0;
const FOOTER_Y: f32 = PAGE_HEIGHT - 15.0;
const HEADER_ROW_HEIGHT: f32 = 7.0;
const ROW_HEIGHT: f32 = 6.0;
const TOTAL_ROW_HEIGHT: f32 = 7.0;
const COLUMNS: [&str; 4] = ["Date", "Value", "Description", "Tags"];
const NO_DATA: &str = "There is no data :'( ";

const BLACK: Rgb = Rgb(0, 0, 0);
const GREY: Rgb = Rgb(225, 225, 225);
const INCOME_FILL: Rgb = Rgb(186, 247, 165);
const PAYMENT_FILL: Rgb = Rgb(229, 126, 105);
const POSITIVE_TEXT: Rgb = Rgb(46, 81, 35);
const NEGATIVE_TEXT: Rgb = Rgb(140, 37, 11);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

/// A positioned box of text with optional fill and border
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub font: FontStyle,
    /// Font size in points
    pub size: f32,
    pub color: Rgb,
    pub fill: Option<Rgb>,
    pub border: bool,
    pub align: Align,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
}

/// Renders a laid-out document into file bytes
pub trait DocumentBackend: Send + Sync {
    fn extension(&self) -> &'static str;
    fn render(&self, document: &Document) -> Result<Vec<u8>>;
}

/// Average Helvetica advance, in ems
const AVERAGE_ADVANCE: f32 = 0.55;

/// Estimated text width in millimetres, used to place and truncate cell text
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * AVERAGE_ADVANCE * size * 25.4 / 72.0
}

/// Cut `text` so it fits into `width` at `size`, marking the cut with ".."
fn fit_text(text: &str, width: f32, size: f32) -> String {
    let limit = width - 2.0;
    if text_width(text, size) <= limit {
        return text.to_string();
    }

    let mut out = String::new();
    for c in text.chars() {
        out.push(c);
        if text_width(&out, size) + text_width("..", size) > limit {
            out.pop();
            break;
        }
    }
    out.push_str("..");
    out
}

struct Layout {
    pages: Vec<Page>,
    y: f32,
    column_width: f32,
}

impl Layout {
    fn new(title: &str) -> Self {
        let title_width = text_width(title, 14.0) + 6.0;
        let first = Page {
            cells: vec![Cell {
                x: PAGE_WIDTH - title_width - MARGIN,
                y: MARGIN,
                width: title_width,
                height: 9.0,
                text: title.to_string(),
                font: FontStyle::Bold,
                size: 14.0,
                color: BLACK,
                fill: None,
                border: false,
                align: Align::Center,
            }],
        };

        Self {
            pages: vec![first],
            y: MARGIN + 9.0 + 8.0,
            column_width: (PAGE_WIDTH - 2.0 * MARGIN) / COLUMNS.len() as f32,
        }
    }

    fn current(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Start a new page when `height` more millimetres would cross the break line
    fn reserve(&mut self, height: f32) -> bool {
        if self.y + height > BREAK_Y {
            self.pages.push(Page::default());
            self.y = MARGIN;
            true
        } else {
            false
        }
    }

    fn row(&mut self, texts: &[String], width: f32, height: f32, style: RowStyle) {
        let mut x = MARGIN;
        let y = self.y;
        for text in texts {
            let cell = Cell {
                x,
                y,
                width,
                height,
                text: fit_text(text, width, style.size),
                font: style.font,
                size: style.size,
                color: style.color,
                fill: Some(style.fill),
                border: true,
                align: style.align,
            };
            self.current().cells.push(cell);
            x += width;
        }
        self.y += height;
    }

    fn column_header(&mut self) {
        let texts: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        let width = self.column_width;
        self.row(
            &texts,
            width,
            HEADER_ROW_HEIGHT,
            RowStyle {
                font: FontStyle::Bold,
                size: 8.0,
                color: BLACK,
                fill: GREY,
                align: Align::Left,
            },
        );
    }

    fn entry_row(&mut self, entry: &Entry) {
        if self.reserve(ROW_HEIGHT) {
            self.column_header();
        }

        let texts = vec![
            display_time(&entry.created_at),
            signed_amount(entry),
            entry.description.clone(),
            entry.tags.join(", "),
        ];
        let width = self.column_width;
        self.row(
            &texts,
            width,
            ROW_HEIGHT,
            RowStyle {
                font: FontStyle::Regular,
                size: 8.0,
                color: BLACK,
                fill: if entry.is_payment { PAYMENT_FILL } else { INCOME_FILL },
                align: Align::Left,
            },
        );
    }

    fn totals_row(&mut self, totals: &Totals) {
        self.reserve(TOTAL_ROW_HEIGHT);

        let width = (PAGE_WIDTH - 2.0 * MARGIN) / 3.0;
        let balance = totals.balance();
        let cells = [
            (format!("Total in: {:.2}", totals.total_in), POSITIVE_TEXT),
            (format!("Total out: {:.2}", totals.total_out), NEGATIVE_TEXT),
            (
                format!("Balance: {:.2}", balance),
                if balance >= 0.0 { POSITIVE_TEXT } else { NEGATIVE_TEXT },
            ),
        ];

        // Each total carries its own text colour, so rows are emitted cell by cell
        let mut x = MARGIN;
        let y = self.y;
        for (text, color) in cells {
            self.current().cells.push(Cell {
                x,
                y,
                width,
                height: TOTAL_ROW_HEIGHT,
                text,
                font: FontStyle::Bold,
                size: 10.0,
                color,
                fill: Some(GREY),
                border: true,
                align: Align::Right,
            });
            x += width;
        }
        self.y += TOTAL_ROW_HEIGHT;
    }

    fn no_data(&mut self) {
        self.current().cells.push(Cell {
            x: 30.0,
            y: 104.0,
            width: text_width(NO_DATA, 16.0),
            height: 8.0,
            text: NO_DATA.to_string(),
            font: FontStyle::Bold,
            size: 16.0,
            color: BLACK,
            fill: None,
            border: false,
            align: Align::Left,
        });
    }

    fn finish(mut self, title: &str, generated_at: &DateTime<Utc>) -> Vec<Page> {
        let count = self.pages.len();
        let width = (PAGE_WIDTH - 2.0 * MARGIN) / 3.0;
        let stamp = display_time(generated_at);

        for (index, page) in self.pages.iter_mut().enumerate() {
            let footer = [
                (title.to_string(), Align::Left),
                (format!("Page {}/{}", index + 1, count), Align::Center),
                (stamp.clone(), Align::Right),
            ];
            for (slot, (text, align)) in footer.into_iter().enumerate() {
                page.cells.push(Cell {
                    x: MARGIN + width * slot as f32,
                    y: FOOTER_Y,
                    width,
                    height: 10.0,
                    text,
                    font: FontStyle::Italic,
                    size: 8.0,
                    color: BLACK,
                    fill: None,
                    border: false,
                    align,
                });
            }
        }

        self.pages
    }
}

#[derive(Clone, Copy)]
struct RowStyle {
    font: FontStyle,
    size: f32,
    color: Rgb,
    fill: Rgb,
    align: Align,
}

/// Lay out the ledger report of `owner`
pub fn layout(entries: &[Entry], owner: &str, generated_at: &DateTime<Utc>) -> Document {
    let title = format!("Money Report of {}", owner);
    let mut layout = Layout::new(&title);

    if entries.is_empty() {
        layout.no_data();
    } else {
        layout.column_header();
        for entry in entries {
            layout.entry_row(entry);
        }
        layout.totals_row(&Totals::from_entries(entries));
    }

    let pages = layout.finish(&title, generated_at);
    Document { title, pages }
}

/// `<unix-nanos>_report_<owner>.<ext>`
pub fn report_file_name(owner: &str, generated_at: &DateTime<Utc>, extension: &str) -> String {
    let nanos = generated_at.timestamp_nanos_opt().unwrap_or_default();
    let safe_owner: String = owner
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("{}_report_{}.{}", nanos, safe_owner, extension)
}

/// Lay out and render the document report as a file ready for upload
pub fn render_document(
    backend: &dyn DocumentBackend,
    entries: &[Entry],
    owner: &str,
    generated_at: DateTime<Utc>,
) -> Result<ReportFile> {
    let document = layout(entries, owner, &generated_at);
    let content = backend.render(&document)?;

    Ok(ReportFile {
        name: report_file_name(owner, &generated_at, backend.extension()),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn generated() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    fn entries(count: usize) -> Vec<Entry> {
        (0..count)
            .map(|i| {
                let amount = if i % 2 == 0 { 10.0 } else { -4.0 };
                Entry::from_signed(
                    "alice",
                    amount,
                    format!("item {}", i),
                    generated() + Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    fn texts(page: &Page) -> Vec<&str> {
        page.cells.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_empty_ledger_renders_single_no_data_page() {
        let document = layout(&[], "alice", &generated());
        assert_eq!(document.pages.len(), 1);

        let page_texts = texts(&document.pages[0]);
        assert!(page_texts.contains(&NO_DATA));
        assert!(page_texts.contains(&"Money Report of alice"));
        assert!(page_texts.contains(&"Page 1/1"));
        assert!(!page_texts.contains(&"Date"));
    }

    #[test]
    fn test_rows_are_coloured_by_direction() {
        let document = layout(&entries(2), "alice", &generated());
        let page = &document.pages[0];

        let income = page.cells.iter().find(|c| c.text == "+10.00").unwrap();
        let payment = page.cells.iter().find(|c| c.text == "-4.00").unwrap();
        assert_eq!(income.fill, Some(INCOME_FILL));
        assert_eq!(payment.fill, Some(PAYMENT_FILL));

        let balance = page.cells.iter().find(|c| c.text == "Balance: 6.00").unwrap();
        assert_eq!(balance.color, POSITIVE_TEXT);
    }

    #[test]
    fn test_negative_balance_is_red() {
        let one_payment = vec![Entry::from_signed("alice", -3.0, "tea".into(), generated())];
        let document = layout(&one_payment, "alice", &generated());
        let balance = document.pages[0]
            .cells
            .iter()
            .find(|c| c.text == "Balance: -3.00")
            .unwrap();
        assert_eq!(balance.color, NEGATIVE_TEXT);
    }

    #[test]
    fn test_long_ledger_paginates_with_footers() {
        let document = layout(&entries(80), "alice", &generated());
        let count = document.pages.len();
        assert!(count >= 2);

        for (index, page) in document.pages.iter().enumerate() {
            let label = format!("Page {}/{}", index + 1, count);
            assert!(texts(page).contains(&label.as_str()));
            assert!(page
                .cells
                .iter()
                .filter(|c| c.border)
                .all(|c| c.y + c.height <= BREAK_Y));
        }

        // Column header repeats on continuation pages
        assert!(texts(&document.pages[1]).contains(&"Date"));
        let last = document.pages.last().unwrap();
        assert!(texts(last).iter().any(|t| t.starts_with("Total in:")));
    }

    #[test]
    fn test_long_descriptions_are_truncated() {
        let long = vec![Entry::from_signed("alice", 1.0, "x".repeat(200), generated())];
        let document = layout(&long, "alice", &generated());
        let cell = document.pages[0]
            .cells
            .iter()
            .find(|c| c.text.starts_with("xx"))
            .unwrap();
        assert!(cell.text.ends_with(".."));
        assert!(text_width(&cell.text, cell.size) <= cell.width);
    }

    #[test]
    fn test_report_file_name() {
        let name = report_file_name("al/ice", &generated(), "pdf");
        let nanos = generated().timestamp_nanos_opt().unwrap();
        assert_eq!(name, format!("{}_report_al_ice.pdf", nanos));
    }
}
