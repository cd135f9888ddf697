// Convert venue wire values into canonical strings, numbers and tick keys.
// Every function here is total: bad input gives None, never a panic.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;

use crate::engine::types::BookLevel;

/// Order-book prices are grouped on a 0.01 grid.
pub const TICKS_PER_UNIT: f64 = 100.0;

// Keeps `price * TICKS_PER_UNIT` well inside i64.
const MAX_ABS_PRICE: f64 = 1e15;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A raw inbound WebSocket payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(t) => t.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turn a frame into JSON. Binary frames may be gzip (HTX); anything larger
/// than `max_bytes`, before or after inflation, is dropped.
pub fn decode_frame(frame: &Frame, max_bytes: usize) -> Option<Value> {
    if frame.len() > max_bytes {
        return None;
    }
    match frame {
        Frame::Text(text) => serde_json::from_str(text).ok(),
        Frame::Binary(bytes) if bytes.starts_with(&GZIP_MAGIC) => {
            let mut inflated = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .take(max_bytes as u64 + 1)
                .read_to_end(&mut inflated)
                .ok()?;
            if inflated.len() > max_bytes {
                return None;
            }
            serde_json::from_slice(&inflated).ok()
        }
        Frame::Binary(bytes) => serde_json::from_slice(bytes).ok(),
    }
}

/// Round a price onto the aggregation grid.
pub fn price_key(price: f64) -> Option<i64> {
    if !price.is_finite() || price.abs() > MAX_ABS_PRICE {
        return None;
    }
    Some((price * TICKS_PER_UNIT).round() as i64)
}

pub fn key_to_price(key: i64) -> f64 {
    key as f64 / TICKS_PER_UNIT
}

pub fn parse_decimal(s: &str) -> Option<f64> {
    let v = s.trim().parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// A JSON number or numeric string as f64.
pub fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// A decimal field kept in string form. Numbers are rendered the way
/// serde_json prints them.
pub fn decimal_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => parse_decimal(s).map(|_| s.trim().to_string()),
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(|_| n.to_string()),
        _ => None,
    }
}

/// Same as [`decimal_string`] with the sign removed. Some venues encode the
/// side in the sign of the amount.
pub fn abs_decimal_string(v: &Value) -> Option<String> {
    let s = decimal_string(v)?;
    Some(s.strip_prefix('-').map(str::to_string).unwrap_or(s))
}

/// Trade ids arrive as numbers or strings.
pub fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Epoch milliseconds from an integer, float or numeric string.
pub fn epoch_ms(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.abs() < 9e18).map(|f| f as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| parse_decimal(s).filter(|f| f.abs() < 9e18).map(|f| f as i64)),
        _ => None,
    }
}

/// Epoch seconds with a fractional part (`"1700000000.123456"`) to ms.
pub fn seconds_to_ms(v: &Value) -> Option<i64> {
    let secs = number(v)?;
    let ms = secs * 1000.0;
    (ms.abs() < 9e18).then_some(ms as i64)
}

/// RFC 3339 timestamp to epoch ms.
pub fn rfc3339_ms(v: &Value) -> Option<i64> {
    let s = v.as_str()?;
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// An array of `[price, qty, ...]` entries. Entries that are not positive
/// finite pairs are skipped; a non-array yields None.
pub fn levels(v: &Value) -> Option<Vec<BookLevel>> {
    let entries = v.as_array()?;
    Some(
        entries
            .iter()
            .filter_map(|entry| {
                let pair = entry.as_array()?;
                let price = number(pair.first()?)?;
                let quantity = number(pair.get(1)?)?;
                (price > 0.0 && quantity > 0.0).then(|| BookLevel::new(price, quantity))
            })
            .collect(),
    )
}
