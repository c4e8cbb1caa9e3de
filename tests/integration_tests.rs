use std::collections::HashMap;
use std::io;

use chrono::Datelike;

use tally::{DateRange, Error, Extractor, InvoiceQuery, InvoiceSource, Ledger};

const NORMAL: &str = "メインメニュー\n９０２\n舞菜\nおかず\n６２０\n１\n６２０\n◇";
const REFUND: &str = "０７／０４\n（０７／０４）\n舞菜\nおかず\n－６２０\n１\n－６２０\n◇返金します";
const MILK: &str = "メインメニュー\n５１０\n牛乳\n１Ｌ\n２３０\n１\n２３０\n◇";

fn sheet(lines: &[&str]) -> String {
    let body: String = lines.iter().map(|line| format!("<p>{}</p>\n", line)).collect();
    format!(
        "<html><body><div class=\"billingSheet\">\n{}</div></body></html>",
        body
    )
}

/// Serves canned pages by day of month and remembers every key it was asked for.
#[derive(Default)]
struct CannedInvoices {
    pages: HashMap<u32, String>,
    failing_day: Option<u32>,
    keys: Vec<String>,
}

impl CannedInvoices {
    fn with(mut self, day: u32, lines: &[&str]) -> Self {
        self.pages.insert(day, sheet(lines));
        self
    }
}

impl InvoiceSource for CannedInvoices {
    fn fetch_invoice(&mut self, query: &InvoiceQuery) -> tally::Result<String> {
        self.keys.push(query.key());
        let day = query.date.day();
        if self.failing_day == Some(day) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        Ok(self.pages.get(&day).cloned().unwrap_or_else(|| sheet(&[])))
    }
}

fn column_sum(output: &[u8]) -> i64 {
    let mut reader = csv::Reader::from_reader(output);
    reader
        .records()
        .map(|record| record.unwrap()[2].parse::<i64>().unwrap())
        .sum()
}

#[test]
fn sanity() {
    let mut source = CannedInvoices::default()
        .with(1, &[NORMAL, MILK])
        .with(4, &[NORMAL, REFUND]);
    let range = DateRange::new(2024, 7, 1, 5);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let summary = tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();

    assert_eq!(source.keys.len(), 5);
    assert_eq!(summary.days, 5);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.total, 620);
    assert_eq!(ledger.total(), summary.total);

    let output = ledger.finish().unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap(),
        "Date,Product,Price\n\
         2024-07-01,舞菜おかず,620\n\
         2024-07-04,舞菜おかず,620\n\
         2024-07-04,舞菜,-620\n"
    );
}

#[test]
fn one_fetch_per_day() {
    for (from, to) in [(1, 1), (1, 31), (10, 16), (28, 30)] {
        let mut source = CannedInvoices::default();
        let range = DateRange::new(2024, 7, from, to);
        let mut ledger = Ledger::new(Vec::new()).unwrap();
        tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();
        assert_eq!(source.keys.len(), (to - from + 1) as usize);
    }
}

#[test]
fn keys_follow_the_calendar() {
    let mut source = CannedInvoices::default();
    let range = DateRange::new(2024, 7, 6, 8);
    let mut ledger = Ledger::new(Vec::new()).unwrap();
    tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();
    assert_eq!(
        source.keys,
        vec!["20240701@7@240", "20240701@1@240", "20240702@2@240"]
    );
}

#[test]
fn empty_day_leaves_total_alone() {
    let mut source = CannedInvoices::default()
        .with(2, &[MILK])
        .with(3, &[NORMAL]);
    let range = DateRange::new(2024, 7, 2, 3);
    let extractor = Extractor::default();

    let query = InvoiceQuery::for_day(&range, 2).unwrap();
    let report = tally::process_day(&mut source, &extractor, &query).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.skipped, 0);

    let mut ledger = Ledger::new(Vec::new()).unwrap();
    let summary = tally::run(&mut source, &range, &extractor, &mut ledger).unwrap();
    assert_eq!(summary.rows, 1);
    assert_eq!(summary.total, 620);
}

#[test]
fn written_column_matches_total() {
    let mut source = CannedInvoices::default()
        .with(1, &[NORMAL])
        .with(2, &[REFUND, REFUND, NORMAL])
        .with(3, &[NORMAL, NORMAL, MILK])
        .with(5, &[REFUND]);
    let range = DateRange::new(2024, 7, 1, 6);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let summary = tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();
    let output = ledger.finish().unwrap();

    assert_eq!(summary.total, 620);
    assert_eq!(column_sum(&output), summary.total);
}

#[test]
fn month_thirteen_is_next_january() {
    let mut source = CannedInvoices::default().with(2, &[NORMAL]);
    let range = DateRange::new(2024, 13, 1, 2);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();

    assert_eq!(source.keys, vec!["20241301@4@240", "20241301@5@240"]);
    let output = String::from_utf8(ledger.finish().unwrap()).unwrap();
    assert_eq!(output, "Date,Product,Price\n2025-01-02,舞菜おかず,620\n");
}

#[test]
fn empty_range_writes_header_only() {
    let mut source = CannedInvoices::default();
    let range = DateRange::new(2024, 7, 10, 9);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let summary = tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();

    assert!(source.keys.is_empty());
    assert_eq!(summary.total, 0);
    assert_eq!(ledger.finish().unwrap(), b"Date,Product,Price\n");
}

#[test]
fn unbuildable_date_fetches_nothing() {
    let mut source = CannedInvoices::default();
    let range = DateRange::new(300_000, 7, 1, 3);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let result = tally::run(&mut source, &range, &Extractor::default(), &mut ledger);

    assert!(matches!(result, Err(Error::InvalidDate { .. })));
    assert!(source.keys.is_empty());
}

#[test]
fn bad_price_aborts_the_run() {
    let broken = "メインメニュー\n９０２\n舞菜\nおかず\n６２０\n１\n六二〇\n◇";
    let mut source = CannedInvoices::default()
        .with(1, &[NORMAL])
        .with(2, &[broken]);
    let range = DateRange::new(2024, 7, 1, 4);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let result = tally::run(&mut source, &range, &Extractor::default(), &mut ledger);

    assert!(matches!(result, Err(Error::Price { .. })));
    assert_eq!(source.keys.len(), 2);
    assert_eq!(ledger.rows(), 1);
}

#[test]
fn fetch_error_aborts_the_run() {
    let mut source = CannedInvoices {
        failing_day: Some(3),
        ..CannedInvoices::default()
    };
    let range = DateRange::new(2024, 7, 1, 5);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let result = tally::run(&mut source, &range, &Extractor::default(), &mut ledger);

    assert!(matches!(result, Err(Error::Io(_))));
    assert_eq!(source.keys.len(), 3);
}
