use log::{debug, info, warn};
use std::io;

use crate::error::Result;
use crate::extract::{DayReport, Extractor};
use crate::query::{DateRange, InvoiceQuery};
use crate::session::InvoiceSource;
use crate::Ledger;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub days: usize,
    pub rows: usize,
    pub total: i64,
}

/// Fetches and extracts a single day. A day without any usable line is
/// reported once and yields an empty report.
pub fn process_day<S: InvoiceSource>(
    source: &mut S,
    extractor: &Extractor,
    query: &InvoiceQuery,
) -> Result<DayReport> {
    let html = source.fetch_invoice(query)?;
    let report = extractor.extract_day(&html, query.date)?;
    if report.is_empty() {
        info!("date: {} no price for {} found", query.date, extractor.marker());
    } else {
        debug!(
            "date: {} {} item(s), subtotal {}",
            query.date,
            report.items.len(),
            report.subtotal()
        );
    }
    Ok(report)
}

/// Walks the range one day at a time, writing every item to the ledger.
/// Stops at the first error.
pub fn run<S: InvoiceSource, W: io::Write>(
    source: &mut S,
    range: &DateRange,
    extractor: &Extractor,
    ledger: &mut Ledger<W>,
) -> Result<Summary> {
    range.validate()?;
    if range.is_empty() {
        warn!("from {} is after to {}, nothing to fetch", range.from, range.to);
    }

    let mut summary = Summary::default();
    for day in range.days() {
        let query = InvoiceQuery::for_day(range, day)?;
        let report = process_day(source, extractor, &query)?;
        ledger.consume(&report.items)?;
        summary.days += 1;
        summary.rows += report.items.len();
        summary.total += report.subtotal();
    }
    Ok(summary)
}
