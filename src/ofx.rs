//! Reader for OFX statement files.
//!
//! Handles both OFX 1.x SGML (leaf elements without closing tags) and OFX 2.x
//! XML. The markup is tokenised by `quick_xml` with end-name checking off, and
//! unclosed SGML leaves are closed as soon as the next tag opens. Only the
//! parts of the document an import needs are kept:
//! - the account number (`BANKACCTFROM` / `CCACCTFROM`)
//! - statement dates and the ledger balance
//! - the `STMTTRN` list, in source order

use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum OfxError {
    #[error("missing <OFX> element")]
    MissingRoot,

    #[error("unreadable markup at byte {position}: {message}")]
    Markup { position: usize, message: String },

    #[error("missing <{field}> in transaction {position}")]
    MissingField { field: &'static str, position: usize },

    #[error("invalid <{field}> value: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfxDocument {
    pub account: Option<OfxAccount>,
    pub statement: Option<OfxStatement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfxAccount {
    /// `ACCTID`
    pub number: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfxStatement {
    pub currency: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `LEDGERBAL/BALAMT`
    pub balance: Option<Decimal>,
    pub transactions: Vec<OfxTransaction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OfxTransaction {
    /// `TRNTYPE`, lower-cased.
    pub kind: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    /// `FITID`
    pub id: String,
    pub payee: String,
    pub memo: String,
}

/// Text of a statement file, decoded with the character set its header
/// declares. Undeclared files are read as UTF-8.
pub fn decode(bytes: &[u8]) -> String {
    let encoding = declared_encoding(bytes).unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("statement is not valid {}; undecodable bytes replaced", used.name());
    }
    debug!("decoded statement as {}", used.name());
    text.into_owned()
}

fn declared_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    let end = bytes
        .windows(4)
        .position(|w| w.eq_ignore_ascii_case(b"<OFX"))
        .unwrap_or(bytes.len().min(1024));
    let header = String::from_utf8_lossy(&bytes[..end]);

    if let Some(prolog) = header.find("<?xml") {
        let rest = &header[prolog..];
        let value = rest.split("encoding=").nth(1)?;
        let quote = value.chars().next()?;
        let label = value[1..].split(quote).next()?;
        return Encoding::for_label(label.trim().as_bytes());
    }

    let mut charset = None;
    for line in header.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        match (key.trim().to_ascii_uppercase().as_str(), value.trim()) {
            ("ENCODING", "UTF-8" | "UNICODE") => return Some(UTF_8),
            ("CHARSET", v) if !v.eq_ignore_ascii_case("NONE") => charset = Some(v.to_string()),
            _ => {}
        }
    }
    let charset = charset?;
    if charset.bytes().all(|b| b.is_ascii_digit()) {
        Encoding::for_label(format!("windows-{charset}").as_bytes())
    } else {
        Encoding::for_label(charset.as_bytes())
    }
}

pub fn parse(content: &str) -> Result<OfxDocument, OfxError> {
    let root = read_elements(content)?;
    let ofx = root.child("OFX").ok_or(OfxError::MissingRoot)?;

    let account = ofx
        .find("BANKACCTFROM")
        .or_else(|| ofx.find("CCACCTFROM"))
        .map(|acct| OfxAccount {
            number: acct.value("ACCTID"),
        });

    let statement = match ofx.find("STMTRS").or_else(|| ofx.find("CCSTMTRS")) {
        Some(stmt) => Some(parse_statement(stmt)?),
        None => None,
    };

    Ok(OfxDocument { account, statement })
}

fn parse_statement(stmt: &Element) -> Result<OfxStatement, OfxError> {
    let tran_list = stmt.child("BANKTRANLIST");
    let (start_date, end_date) = match tran_list {
        Some(list) => (optional_date(list, "DTSTART")?, optional_date(list, "DTEND")?),
        None => (None, None),
    };

    let balance = stmt
        .child("LEDGERBAL")
        .and_then(|ledger| ledger.value("BALAMT"))
        .map(|raw| parse_amount(&raw).ok_or(OfxError::InvalidValue { field: "BALAMT", value: raw }))
        .transpose()?;

    let transactions = tran_list
        .into_iter()
        .flat_map(|list| list.children_named("STMTTRN"))
        .enumerate()
        .map(|(i, trn)| parse_transaction(trn, i + 1))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OfxStatement {
        currency: stmt.value("CURDEF"),
        start_date,
        end_date,
        balance,
        transactions,
    })
}

fn parse_transaction(trn: &Element, position: usize) -> Result<OfxTransaction, OfxError> {
    let required = |field: &'static str| trn.value(field).ok_or(OfxError::MissingField { field, position });

    let id = required("FITID")?;
    let raw_date = required("DTPOSTED")?;
    let date = parse_date(&raw_date).ok_or(OfxError::InvalidValue { field: "DTPOSTED", value: raw_date })?;
    let raw_amount = required("TRNAMT")?;
    let amount = parse_amount(&raw_amount).ok_or(OfxError::InvalidValue { field: "TRNAMT", value: raw_amount })?;

    Ok(OfxTransaction {
        kind: trn.value("TRNTYPE").map(|t| t.to_lowercase()).unwrap_or_default(),
        date,
        amount,
        id,
        payee: trn.value("NAME").or_else(|| trn.value("PAYEE")).unwrap_or_default(),
        memo: trn.value("MEMO").unwrap_or_default(),
    })
}

fn optional_date(parent: &Element, field: &'static str) -> Result<Option<NaiveDate>, OfxError> {
    parent
        .value(field)
        .map(|raw| parse_date(&raw).ok_or(OfxError::InvalidValue { field, value: raw }))
        .transpose()
}

/// UTC calendar date of an OFX datetime such as
/// `20240105223000.000[-5:EST]`. The bracketed offset is in hours and is
/// subtracted from the local time; without one the time is taken as UTC.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let (stamp, zone) = match raw.split_once('[') {
        Some((stamp, zone)) => (stamp, Some(zone.trim_end_matches(']'))),
        None => (raw, None),
    };
    let digits = stamp.split('.').next()?;
    if digits.len() < 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let field = |range: std::ops::Range<usize>| digits.get(range).map_or(Some(0), |s| s.parse::<u32>().ok());
    let date = NaiveDate::from_ymd_opt(digits[0..4].parse().ok()?, field(4..6)?, field(6..8)?)?;
    let time = NaiveTime::from_hms_opt(field(8..10)?, field(10..12)?, field(12..14)?)?;

    let offset_hours: f64 = match zone {
        Some(zone) => zone.split(':').next()?.trim().parse().ok()?,
        None => 0.0,
    };
    let offset = Duration::seconds((offset_hours * 3600.0).round() as i64);
    Some((NaiveDateTime::new(date, time) - offset).date())
}

pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s = raw.trim();
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.contains(',') && !s.contains('.') {
        return Decimal::from_str(&s.replace(',', ".")).ok();
    }
    Decimal::from_str(s).ok()
}

// ---------------------------------------------------------------------------
// Element tree
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn named(name: &[u8]) -> Self {
        Self {
            name: String::from_utf8_lossy(name).to_ascii_uppercase(),
            ..Self::default()
        }
    }

    /// An SGML leaf: it has a value and nothing nested.
    fn is_leaf(&self) -> bool {
        self.text.is_some() && self.children.is_empty()
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant with this name, depth first.
    fn find(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }

    fn value(&self, name: &str) -> Option<String> {
        self.child(name)
            .and_then(|c| c.text.clone())
            .filter(|v| !v.is_empty())
    }
}

/// Pops the innermost open element into its parent. The synthetic root
/// at the bottom of the stack is never popped.
fn close_top(stack: &mut Vec<Element>) {
    if stack.len() > 1 {
        if let Some(done) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(done);
            }
        }
    }
}

fn close_open_leaf(stack: &mut Vec<Element>) {
    if stack.len() > 1 && stack.last().is_some_and(Element::is_leaf) {
        close_top(stack);
    }
}

fn read_elements(content: &str) -> Result<Element, OfxError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);
    reader.check_end_names(false);

    let mut stack = vec![Element::default()];
    loop {
        let event = reader.read_event().map_err(|e| OfxError::Markup {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;
        match event {
            Event::Start(e) => {
                close_open_leaf(&mut stack);
                stack.push(Element::named(e.name().as_ref()));
            }
            Event::Empty(e) => {
                close_open_leaf(&mut stack);
                let mut leaf = Element::named(e.name().as_ref());
                leaf.text = Some(String::new());
                stack.push(leaf);
                close_top(&mut stack);
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_uppercase();
                // An end tag with no matching open element is ignored.
                if stack.iter().skip(1).any(|el| el.name == name) {
                    while stack.len() > 1 {
                        let matched = stack.last().is_some_and(|el| el.name == name);
                        close_top(&mut stack);
                        if matched {
                            break;
                        }
                    }
                }
            }
            Event::Text(e) => {
                // SGML files carry bare `&` in names; keep those as written.
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                let text = text.trim();
                if let Some(top) = stack.last_mut().filter(|_| !text.is_empty()) {
                    top.text = Some(text.to_string());
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text = Some(String::from_utf8_lossy(&e).into_owned());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}
