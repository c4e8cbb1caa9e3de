use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Datelike;
use log::{Level, LevelFilter, Log, Metadata, Record};

use tally::{DateRange, Extractor, InvoiceQuery, InvoiceSource, Ledger};

// One test per binary: the logger is process-wide.

static LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct Capture;

impl Log for Capture {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            LINES.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: Capture = Capture;

struct Pages(HashMap<u32, &'static str>);

impl InvoiceSource for Pages {
    fn fetch_invoice(&mut self, query: &InvoiceQuery) -> tally::Result<String> {
        let body = self.0.get(&query.date.day()).copied().unwrap_or("");
        Ok(format!(
            "<html><body><div class=\"billingSheet\"><p>{}</p></div></body></html>",
            body
        ))
    }
}

fn lines_mentioning(date: &str) -> usize {
    LINES
        .lock()
        .unwrap()
        .iter()
        .filter(|line| line.contains(date))
        .count()
}

#[test]
fn one_diagnostic_per_empty_day() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Info);

    let mut source = Pages(HashMap::from([
        (2, "メインメニュー\n５１０\n牛乳\n１Ｌ\n２３０\n１\n２３０\n◇"),
        (3, "メインメニュー\n９０２\n舞菜\nおかず\n６２０\n１\n６２０\n◇"),
    ]));
    let range = DateRange::new(2024, 7, 2, 4);
    let mut ledger = Ledger::new(Vec::new()).unwrap();

    let summary = tally::run(&mut source, &range, &Extractor::default(), &mut ledger).unwrap();

    assert_eq!(summary.rows, 1);
    assert_eq!(summary.total, 620);
    // day 2 only lists another product, day 4 has an empty sheet
    assert_eq!(lines_mentioning("2024-07-02"), 1);
    assert_eq!(lines_mentioning("2024-07-04"), 1);
    assert_eq!(lines_mentioning("2024-07-03"), 0);
}
