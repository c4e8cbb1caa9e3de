use chrono::NaiveDate;
use log::info;
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{Error, Result};
use crate::LineItem;

/// Container holding one day's billing breakdown.
pub const SHEET_SELECTOR: &str = "div.billingSheet";
/// Token that switches a line to the refund layout.
pub const REFUND_MARKER: &str = "◇返金します";
pub const DEFAULT_PRODUCT: &str = "舞菜";

/// Layout of a tokenized billing line.
///
/// Refund lines look like
/// `０７／０４ （０７／０４） 舞菜 おかず －６２０ １ －６２０ ◇返金します`,
/// normal lines like `メインメニュー ９０２ 舞菜 おかず ６２０ １ ６２０ ◇`.
/// Both are read purely by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    Refund { label: String, price_token: String },
    Normal { label: String, price_token: String },
    Unrecognized,
}

impl LineClass {
    pub fn classify(fields: &[&str]) -> Self {
        if fields.contains(&REFUND_MARKER) {
            match (fields.get(2), fields.get(5)) {
                (Some(label), Some(price)) => LineClass::Refund {
                    label: label.to_string(),
                    price_token: price.to_string(),
                },
                _ => LineClass::Unrecognized,
            }
        } else if fields.len() > 2 {
            match (fields.get(2), fields.get(3), fields.get(6)) {
                (Some(name), Some(kind), Some(price)) => LineClass::Normal {
                    label: format!("{}{}", name, kind),
                    price_token: price.to_string(),
                },
                _ => LineClass::Unrecognized,
            }
        } else {
            LineClass::Unrecognized
        }
    }

    /// `None` for unrecognized lines; a price that does not parse is an error.
    pub fn into_item(self, date: NaiveDate) -> Result<Option<LineItem>> {
        let (label, price_token) = match self {
            LineClass::Refund { label, price_token } | LineClass::Normal { label, price_token } => {
                (label, price_token)
            }
            LineClass::Unrecognized => return Ok(None),
        };
        Ok(Some(LineItem::new(date, label, parse_price(&price_token)?)))
    }
}

/// Folds full-width ASCII variants (U+FF01..U+FF5E) and the ideographic space
/// to their half-width forms. Everything else passes through.
pub fn fold_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

pub fn parse_price(token: &str) -> Result<i64> {
    let folded = fold_width(token);
    folded.parse::<i64>().map_err(|source| Error::Price {
        token: folded,
        source,
    })
}

/// What one day's invoice yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayReport {
    pub date: NaiveDate,
    pub items: Vec<LineItem>,
    pub skipped: usize,
}

impl DayReport {
    pub fn subtotal(&self) -> i64 {
        self.items.iter().map(|item| item.price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct Extractor {
    marker: String,
    sheet: Selector,
}

impl Extractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Extractor {
            marker: marker.into(),
            sheet: Selector::parse(SHEET_SELECTOR).expect("billing sheet selector is valid"),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Space-separated pieces of billing-sheet text that mention the marker,
    /// in document order.
    pub fn candidate_lines(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut lines = Vec::new();
        for sheet in document.select(&self.sheet) {
            for child in sheet.children() {
                let text = match child.value() {
                    Node::Text(text) => String::from(&**text),
                    Node::Element(_) => ElementRef::wrap(child)
                        .map(|element| element.text().collect::<String>())
                        .unwrap_or_default(),
                    _ => continue,
                };
                if !text.contains(self.marker.as_str()) {
                    continue;
                }
                lines.extend(
                    text.split(' ')
                        .filter(|line| line.contains(self.marker.as_str()))
                        .map(str::to_owned),
                );
            }
        }
        lines
    }

    pub fn extract_day(&self, html: &str, date: NaiveDate) -> Result<DayReport> {
        let mut report = DayReport {
            date,
            items: Vec::new(),
            skipped: 0,
        };
        for line in self.candidate_lines(html) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            match LineClass::classify(&fields).into_item(date)? {
                Some(item) => report.items.push(item),
                None => {
                    info!("date: {} price of {} not found on this line", date, self.marker);
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Extractor::new(DEFAULT_PRODUCT)
    }
}

#[cfg(test)]
fn july(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
}

#[cfg(test)]
const SHEET: &str = r#"<html><body>
<div class="header">舞菜 メインメニュー ９０２ 舞菜 おかず ６２０ １ ６２０ ◇</div>
<div class="billingSheet">
<p>メインメニュー
９０２
舞菜
おかず
６２０
１
６２０
◇</p>
<p>メインメニュー
５１０
牛乳
１Ｌ
２３０
１
２３０
◇</p>
<p>０７／０４
（０７／０４）
舞菜
おかず
－６２０
１
－６２０
◇返金します</p>
舞菜のお知らせ
</div>
</body></html>"#;

#[test]
fn refund_line() {
    let fields = [
        "07/04", "(07/04)", "舞菜", "おかず", "-620", "1", "-620", "◇返金します",
    ];
    let class = LineClass::classify(&fields);
    assert_eq!(
        class,
        LineClass::Refund {
            label: "舞菜".to_string(),
            price_token: "-620".to_string()
        }
    );
    let item = class.into_item(july(4)).unwrap().unwrap();
    assert_eq!(item.product, "舞菜");
    assert_eq!(item.price, -620);
}

#[test]
fn normal_line() {
    let fields = ["メインメニュー", "902", "舞菜", "おかず", "620", "1", "620", "◇"];
    let class = LineClass::classify(&fields);
    assert!(matches!(class, LineClass::Normal { .. }));
    let item = class.into_item(july(4)).unwrap().unwrap();
    assert_eq!(item.product, "舞菜おかず");
    assert_eq!(item.price, 620);
}

#[test]
fn short_lines_are_unrecognized() {
    assert_eq!(LineClass::classify(&["舞菜"]), LineClass::Unrecognized);
    assert_eq!(LineClass::classify(&["a", "舞菜"]), LineClass::Unrecognized);
    // enough fields for the normal branch but no price column
    assert_eq!(
        LineClass::classify(&["メインメニュー", "902", "舞菜"]),
        LineClass::Unrecognized
    );
    assert_eq!(
        LineClass::classify(&["メインメニュー", "902", "舞菜", "おかず", "620", "1"]),
        LineClass::Unrecognized
    );
    // refund marker present but the price column is missing
    assert_eq!(
        LineClass::classify(&["07/04", "(07/04)", "舞菜", "◇返金します"]),
        LineClass::Unrecognized
    );
    assert_eq!(LineClass::Unrecognized.into_item(july(1)).unwrap(), None);
}

#[test]
fn full_width_digits() {
    assert_eq!(fold_width("－６２０"), "-620");
    assert_eq!(fold_width("１　２"), "1 2");
    assert_eq!(fold_width("舞菜"), "舞菜");
    assert_eq!(parse_price("－６２０").unwrap(), -620);
    assert_eq!(parse_price("６２０").unwrap(), 620);
    assert_eq!(parse_price("+620").unwrap(), 620);
}

#[test]
fn bad_price_is_an_error() {
    let err = parse_price("６２０円").unwrap_err();
    assert!(matches!(err, Error::Price { ref token, .. } if token == "620円"));

    let fields = ["メインメニュー", "902", "舞菜", "おかず", "620", "1", "--", "◇"];
    assert!(LineClass::classify(&fields).into_item(july(1)).is_err());
}

#[test]
fn sheet_extraction() {
    let extractor = Extractor::default();
    let report = extractor.extract_day(SHEET, july(4)).unwrap();
    assert_eq!(
        report.items,
        vec![
            LineItem::new(july(4), "舞菜おかず".to_string(), 620),
            LineItem::new(july(4), "舞菜".to_string(), -620),
        ]
    );
    assert_eq!(report.skipped, 1);
    assert_eq!(report.subtotal(), 0);
}

#[test]
fn only_billing_sheet_children_are_read() {
    let extractor = Extractor::default();
    let lines = extractor.candidate_lines(SHEET);
    assert_eq!(lines.len(), 3);
    assert!(lines.iter().all(|line| !line.contains("牛乳")));
}

#[test]
fn pieces_are_split_on_ascii_space() {
    let html = r#"<div class="billingSheet"><p>メインメニュー
９０２
舞菜
おかず
６２０
１
６２０
◇ お知らせ 舞菜です</p></div>"#;
    let extractor = Extractor::default();
    assert_eq!(extractor.candidate_lines(html).len(), 2);
    let report = extractor.extract_day(html, july(2)).unwrap();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.skipped, 1);
}

#[test]
fn no_marker_no_items() {
    let html = r#"<div class="billingSheet"><p>牛乳 ２３０</p></div>"#;
    let report = Extractor::default().extract_day(html, july(3)).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.skipped, 0);
    assert_eq!(report.subtotal(), 0);
}

#[test]
fn other_markers() {
    let extractor = Extractor::new("牛乳");
    let report = extractor.extract_day(SHEET, july(4)).unwrap();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].product, "牛乳１Ｌ");
    assert_eq!(report.items[0].price, 230);
}
