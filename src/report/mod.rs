//! Report aggregation
//!
//! One pass over an ordered entry sequence produces the running totals; the
//! text table and the paginated document both render from it.

use crate::models::{Entry, Tag};
use chrono::{DateTime, Local, Utc};

pub mod document;
pub mod pdf;

pub use document::{render_document, Document, DocumentBackend};
pub use pdf::PdfBackend;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";
const SEPARATOR: &str = "-----------------------------------";

/// Income/expense totals of a ledger slice
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub total_in: f64,
    pub total_out: f64,
}

impl Totals {
    pub fn from_entries(entries: &[Entry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, entry| {
            if entry.is_payment {
                acc.total_out += entry.value;
            } else {
                acc.total_in += entry.value;
            }
            acc
        })
    }

    pub fn balance(&self) -> f64 {
        self.total_in - self.total_out
    }
}

/// Local wall-clock rendering used by every report
pub fn display_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

/// `+14.00` for income, `-5.00` for payments
pub fn signed_amount(entry: &Entry) -> String {
    format!("{:+.2}", entry.signed_value())
}

/// Fixed-width text table with a totals trailer
pub fn render_table(entries: &[Entry]) -> String {
    let totals = Totals::from_entries(entries);
    let mut out = String::new();

    for entry in entries {
        out.push_str(&format!(
            "{} | {} | {}\n",
            display_time(&entry.created_at),
            signed_amount(entry),
            entry.description
        ));
    }

    out.push_str(SEPARATOR);
    out.push('\n');
    out.push_str(&format!("Total in: {:.2}\n", totals.total_in));
    out.push_str(&format!("Total out: {:.2}\n", totals.total_out));
    out.push_str(&format!("Balance: {:.2}\n", totals.balance()));

    out
}

pub fn render_tag_table(tags: &[Tag]) -> String {
    let mut out = String::from("Your Tags\n");
    for tag in tags {
        out.push_str(&format!("{} | {}\n", display_time(&tag.created_at), tag.name));
    }
    out
}
