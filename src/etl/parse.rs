//! Parse functions - coerce untyped document fields into typed values

use crate::etl::error::{EtlError, EtlResult};
use crate::etl::types::RawRecord;
use chrono::{DateTime, Months, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

static NUMERIC_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+\.?\d*)").expect("valid numeric token regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Typed access to the fields of one raw document
///
/// Null values and empty strings in numeric fields read as absent. A value
/// that is present but cannot be read as the requested type is a
/// source-shape error naming the collection, row index and field.
pub struct Fields<'a> {
    collection: &'static str,
    index: usize,
    record: &'a RawRecord,
}

impl<'a> Fields<'a> {
    pub fn new(collection: &'static str, index: usize, record: &'a RawRecord) -> Self {
        Self {
            collection,
            index,
            record,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn error(&self, field: &'static str, reason: impl Into<String>) -> EtlError {
        EtlError::shape(self.collection, self.index, field, reason)
    }

    fn value(&self, field: &str) -> Option<Value> {
        match self.record.get(field).map(unwrap_extended_json) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    /// Text rendering of any scalar; arrays and objects render as JSON
    pub fn text(&self, field: &str) -> Option<String> {
        match self.value(field)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn int(&self, field: &'static str) -> EtlResult<Option<i64>> {
        let number = match self.value(field) {
            None => return Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => parse_integer(s.trim()),
            Some(_) => None,
        };
        number
            .map(Some)
            .ok_or_else(|| self.error(field, "is not an integer"))
    }

    pub fn decimal(&self, field: &'static str) -> EtlResult<Option<Decimal>> {
        let number = match self.value(field) {
            None => return Ok(None),
            Some(Value::Number(n)) => parse_decimal(&n.to_string()),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => parse_decimal(s.trim()),
            Some(_) => None,
        };
        number
            .map(Some)
            .ok_or_else(|| self.error(field, "is not a decimal number"))
    }

    pub fn flag(&self, field: &'static str) -> EtlResult<Option<bool>> {
        match self.value(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(self.error(field, "is not a boolean flag")),
            },
            Some(Value::String(s)) => {
                parse_flag(&s).map_err(|reason| self.error(field, reason))
            }
            Some(_) => Err(self.error(field, "is not a boolean flag")),
        }
    }

    pub fn required_int(&self, field: &'static str) -> EtlResult<i64> {
        self.int(field)?
            .ok_or_else(|| self.error(field, "is required but missing"))
    }

    pub fn required_text(&self, field: &'static str) -> EtlResult<String> {
        self.text(field)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| self.error(field, "is required but missing"))
    }
}

/// Collapse MongoDB extended-JSON wrappers (`$numberLong`, `$date`, ...)
/// into plain JSON scalars
pub fn unwrap_extended_json(value: &Value) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    if map.len() != 1 {
        return value.clone();
    }
    let Some((key, inner)) = map.iter().next() else {
        return value.clone();
    };

    match key.as_str() {
        "$numberLong" | "$numberInt" | "$numberDouble" | "$numberDecimal" | "$oid" => {
            unwrap_extended_json(inner)
        }
        "$date" => {
            let millis = match unwrap_extended_json(inner) {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => match s.parse::<i64>() {
                    Ok(ms) => Some(ms),
                    Err(_) => return Value::String(s),
                },
                _ => None,
            };
            millis
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .unwrap_or(Value::Null)
        }
        _ => value.clone(),
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse `t`/`f` style flags; empty text is absent
pub fn parse_flag(s: &str) -> Result<Option<bool>, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "t" | "true" | "1" | "yes" => Ok(Some(true)),
        "f" | "false" | "0" | "no" => Ok(Some(false)),
        other => Err(format!("is not a boolean flag: {:?}", other)),
    }
}

/// Parse a date written in any of the accepted source formats, dropping
/// any time-of-day component
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| dt.date())
}

/// Parse an optional date field; absent stays absent, unparseable text is fatal
pub fn parse_date_field(
    fields: &Fields<'_>,
    field: &'static str,
) -> EtlResult<Option<NaiveDate>> {
    parse_date_text(fields.collection, fields.index, field, fields.text(field).as_deref())
}

/// Same as [`parse_date_field`] for text captured earlier from a document
pub fn parse_date_text(
    collection: &'static str,
    index: usize,
    field: &'static str,
    text: Option<&str>,
) -> EtlResult<Option<NaiveDate>> {
    match text {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date(s).map(Some).ok_or_else(|| {
            EtlError::shape(collection, index, field, format!("is not a date: {:?}", s))
        }),
    }
}

/// Render a date in ISO `YYYY-MM-DD` form
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// True when the last review predates the scrape by more than one calendar year
pub fn is_stale(last_scraped: NaiveDate, last_review: NaiveDate) -> bool {
    match last_scraped.checked_sub_months(Months::new(12)) {
        Some(cutoff) => last_review < cutoff,
        None => false,
    }
}

/// Parse a listed price such as `$1,234.50`
/// Blank, non-numeric and negative prices are rejected
pub fn parse_price(raw: &str) -> Option<Decimal> {
    let clean = raw.replace(['$', ','], "");
    let clean = clean.trim();
    if clean.is_empty() {
        return None;
    }

    parse_decimal(clean).filter(|price| !price.is_sign_negative())
}

/// Derive a whole bathroom count from free text such as `1.5 shared baths`
pub fn bathrooms_count(text: Option<&str>) -> i64 {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return 1;
    };

    NUMERIC_TOKEN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|count| count.ceil() as i64)
        .unwrap_or(1)
        .max(1)
}

/// Zero bedroom/bed counts mean unknown; raise them to the minimum plausible value
pub fn repair_count(count: Option<i64>) -> Option<i64> {
    match count {
        Some(0) => Some(1),
        other => other,
    }
}

/// Deserialize a string-encoded list such as `['email', 'phone']` or
/// `["Wifi", "Kitchen"]`
pub fn parse_list_literal(raw: &str) -> Result<Vec<String>, String> {
    let trimmed = raw.trim();
    if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Ok(items);
    }

    let mut chars = trimmed.chars().peekable();
    if chars.next() != Some('[') {
        return Err(format!("is not a list: {:?}", preview(trimmed)));
    }

    let mut items = Vec::new();
    loop {
        skip_whitespace(&mut chars);
        match chars.next() {
            Some(']') => break,
            Some(quote @ ('\'' | '"')) => {
                items.push(read_quoted(&mut chars, quote)?);
                skip_whitespace(&mut chars);
                match chars.next() {
                    Some(',') => continue,
                    Some(']') => break,
                    other => {
                        return Err(format!("expected ',' or ']' after list item, found {:?}", other))
                    }
                }
            }
            other => return Err(format!("expected a quoted list item, found {:?}", other)),
        }
    }

    skip_whitespace(&mut chars);
    if chars.next().is_some() {
        return Err(format!("has trailing text after list: {:?}", preview(trimmed)));
    }

    Ok(items)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) -> Result<String, String> {
    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            c if c == quote => return Ok(out),
            '\\' => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('u') => out.push(read_hex_escape(chars, 4)?),
                Some('x') => out.push(read_hex_escape(chars, 2)?),
                Some(other) => out.push(other),
                None => return Err("has an unterminated escape".to_string()),
            },
            c => out.push(c),
        }
    }
    Err("has an unterminated quoted item".to_string())
}

fn read_hex_escape(chars: &mut Peekable<Chars<'_>>, digits: usize) -> Result<char, String> {
    let hex: String = chars.by_ref().take(digits).collect();
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("has an invalid escape: {:?}", hex))
}

fn preview(s: &str) -> String {
    s.chars().take(40).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert_eq!(parse_date("2024-06-01"), Some(expected));
        assert_eq!(parse_date("2024-06-01 13:45:00"), Some(expected));
        assert_eq!(parse_date("2024-06-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("06/01/2024"), Some(expected));
        assert_eq!(parse_date("June 01, 2024"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_format_date_drops_time() {
        let date = parse_date("2023-12-25T20:00:00+00:00").unwrap();
        assert_eq!(format_date(date), "2023-12-25");
    }

    #[test]
    fn test_staleness_rule() {
        let scraped = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert!(is_stale(scraped, NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()));
        assert!(!is_stale(scraped, NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()));
        // Exactly one year back is still fresh
        assert!(!is_stale(scraped, NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()));
    }

    #[test]
    fn test_staleness_leap_day() {
        let scraped = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();

        assert!(!is_stale(scraped, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()));
        assert!(is_stale(scraped, NaiveDate::from_ymd_opt(2023, 2, 27).unwrap()));
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,234.50"), Some(Decimal::new(123450, 2)));
        assert_eq!(parse_price("$85.00"), Some(Decimal::new(85, 0)));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("  "), None);
        assert_eq!(parse_price("$"), None);
        assert_eq!(parse_price("call us"), None);
        assert_eq!(parse_price("-$20.00"), None);
    }

    #[test]
    fn test_bathrooms_count() {
        assert_eq!(bathrooms_count(Some("1.5 baths")), 2);
        assert_eq!(bathrooms_count(Some("2 shared baths")), 2);
        assert_eq!(bathrooms_count(Some("")), 1);
        assert_eq!(bathrooms_count(None), 1);
        assert_eq!(bathrooms_count(Some("Half-bath")), 1);
        assert_eq!(bathrooms_count(Some("0 baths")), 1);
        assert_eq!(bathrooms_count(Some("3.25 baths")), 4);
    }

    #[test]
    fn test_repair_count() {
        assert_eq!(repair_count(Some(0)), Some(1));
        assert_eq!(repair_count(Some(3)), Some(3));
        assert_eq!(repair_count(None), None);
    }

    #[test]
    fn test_parse_list_literal_python_style() {
        assert_eq!(
            parse_list_literal("['email', 'phone']").unwrap(),
            vec!["email", "phone"]
        );
        assert_eq!(
            parse_list_literal("['work_email', ]").unwrap(),
            vec!["work_email"]
        );
        assert_eq!(
            parse_list_literal(r#"['host\'s guide', "Chef's kitchen"]"#).unwrap(),
            vec!["host's guide", "Chef's kitchen"]
        );
        assert!(parse_list_literal("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_list_literal_json_style() {
        assert_eq!(
            parse_list_literal(r#"["Wifi", "Café access"]"#).unwrap(),
            vec!["Wifi", "Café access"]
        );
    }

    #[test]
    fn test_parse_list_literal_rejects_malformed() {
        assert!(parse_list_literal("None").is_err());
        assert!(parse_list_literal("email, phone").is_err());
        assert!(parse_list_literal("['email'").is_err());
        assert!(parse_list_literal("['email'] extra").is_err());
        assert!(parse_list_literal("[email]").is_err());
    }

    #[test]
    fn test_fields_coercion() {
        let raw = record(json!({
            "id": {"$numberLong": "1234567890123"},
            "beds": "2",
            "bedrooms": 3.0,
            "empty": "",
            "rating": 4.87,
            "superhost": "t",
            "last_scraped": {"$date": "2024-06-01T00:00:00Z"},
            "bad_int": "two",
        }));
        let fields = Fields::new("listings", 0, &raw);

        assert_eq!(fields.required_int("id").unwrap(), 1_234_567_890_123);
        assert_eq!(fields.int("beds").unwrap(), Some(2));
        assert_eq!(fields.int("bedrooms").unwrap(), Some(3));
        assert_eq!(fields.int("empty").unwrap(), None);
        assert_eq!(fields.int("missing").unwrap(), None);
        assert_eq!(fields.decimal("rating").unwrap(), Some(Decimal::new(487, 2)));
        assert_eq!(fields.flag("superhost").unwrap(), Some(true));
        assert_eq!(
            parse_date_field(&fields, "last_scraped").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert!(fields.int("bad_int").unwrap_err().is_source_shape());
        assert!(fields.required_int("missing").is_err());
    }

    #[test]
    fn test_extended_json_date_millis() {
        let value = json!({"$date": {"$numberLong": "1717200000000"}});
        assert_eq!(
            unwrap_extended_json(&value),
            Value::String("2024-06-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_array_field_renders_as_list_text() {
        let raw = record(json!({"amenities": ["Wifi", "Kitchen"]}));
        let fields = Fields::new("listings", 0, &raw);
        let text = fields.text("amenities").unwrap();

        assert_eq!(parse_list_literal(&text).unwrap(), vec!["Wifi", "Kitchen"]);
    }
}
