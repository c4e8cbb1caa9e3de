use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io;
use std::path::Path;

pub mod config;
pub mod error;
pub mod extract;
pub mod query;
pub mod run;
pub mod session;

pub use crate::config::{Args, Credentials};
pub use crate::error::{Error, Result};
pub use crate::extract::{DayReport, Extractor, LineClass};
pub use crate::query::{DateRange, InvoiceQuery};
pub use crate::run::{process_day, run, Summary};
pub use crate::session::{InvoiceSource, Session};

pub const HEADER: [&str; 3] = ["Date", "Product", "Price"];
pub const DEFAULT_OUTPUT: &str = "coop_data.csv";

/// One purchased (or refunded) product on one day.
///
/// `price` is the parsed integer, so the Price column holds its normalized
/// form: `６２０` and `+620` are both written as `620`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub date: NaiveDate,
    pub product: String,
    pub price: i64,
}

impl LineItem {
    pub fn new(date: NaiveDate, product: String, price: i64) -> Self {
        LineItem {
            date,
            product,
            price,
        }
    }
}

impl Serialize for LineItem {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("LineItem", 3)?;
        state.serialize_field("Date", &self.date.format("%Y-%m-%d").to_string())?;
        state.serialize_field("Product", &self.product)?;
        state.serialize_field("Price", &self.price)?;
        state.end()
    }
}

/// CSV table of line items plus the running total of their prices.
pub struct Ledger<W: io::Write> {
    writer: csv::Writer<W>,
    total: i64,
    rows: usize,
}

impl Ledger<File> {
    /// Creates (or truncates) the output file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ledger::new(File::create(path)?)
    }
}

impl<W: io::Write> Ledger<W> {
    /// Writes the header straight away, so even an empty run leaves one line.
    pub fn new(target: W) -> Result<Self> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(target);
        writer.write_record(HEADER)?;
        Ok(Ledger {
            writer,
            total: 0,
            rows: 0,
        })
    }

    pub fn record(&mut self, item: &LineItem) -> Result<()> {
        self.writer.serialize(item)?;
        self.total += item.price;
        self.rows += 1;
        Ok(())
    }

    pub fn consume<'a>(&mut self, items: impl IntoIterator<Item = &'a LineItem>) -> Result<()> {
        items.into_iter().try_for_each(|item| self.record(item))
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes and hands back the target.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        self.writer
            .into_inner()
            .map_err(|err| Error::Io(err.into_error()))
    }
}

#[cfg(test)]
fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
}

#[test]
fn header_only() {
    let ledger = Ledger::new(Vec::new()).unwrap();
    assert_eq!(ledger.total(), 0);
    assert_eq!(ledger.rows(), 0);
    let output = ledger.finish().unwrap();
    assert_eq!(output, b"Date,Product,Price\n");
}

#[test]
fn rows_and_total() {
    let mut ledger = Ledger::new(Vec::new()).unwrap();
    ledger
        .record(&LineItem::new(day(1), "舞菜おかず".to_string(), 620))
        .unwrap();
    ledger
        .record(&LineItem::new(day(4), "舞菜".to_string(), -620))
        .unwrap();
    ledger
        .record(&LineItem::new(day(5), "舞菜おかず".to_string(), 640))
        .unwrap();

    assert_eq!(ledger.total(), 640);
    assert_eq!(ledger.rows(), 3);

    let output = String::from_utf8(ledger.finish().unwrap()).unwrap();
    assert_eq!(
        output,
        "Date,Product,Price\n\
         2024-07-01,舞菜おかず,620\n\
         2024-07-04,舞菜,-620\n\
         2024-07-05,舞菜おかず,640\n"
    );
}

#[test]
fn price_written_normalized() {
    let price = crate::extract::parse_price("＋６２０").unwrap();
    let mut ledger = Ledger::new(Vec::new()).unwrap();
    ledger
        .record(&LineItem::new(day(6), "舞菜".to_string(), price))
        .unwrap();
    let output = String::from_utf8(ledger.finish().unwrap()).unwrap();
    assert_eq!(output, "Date,Product,Price\n2024-07-06,舞菜,620\n");
}

#[test]
fn consume_keeps_order() {
    let items = vec![
        LineItem::new(day(2), "b".to_string(), 2),
        LineItem::new(day(1), "a".to_string(), 1),
    ];
    let mut ledger = Ledger::new(Vec::new()).unwrap();
    ledger.consume(&items).unwrap();
    let output = String::from_utf8(ledger.finish().unwrap()).unwrap();
    assert_eq!(output, "Date,Product,Price\n2024-07-02,b,2\n2024-07-01,a,1\n");
}
