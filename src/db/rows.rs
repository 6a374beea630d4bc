//! Decoding of PostgreSQL rows into JSON objects.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use sqlx::postgres::types::{PgInterval, PgMoney, PgPoint};
use sqlx::postgres::{PgColumn, PgRow, PgTypeKind, PgValueFormat};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use uuid::Uuid;

/// Column metadata echoed by the proxy's query endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "dataTypeID")]
    pub data_type_id: u32,
}

pub fn field_info(columns: &[PgColumn]) -> Vec<FieldInfo> {
    columns
        .iter()
        .map(|col| FieldInfo {
            name: col.name().to_string(),
            data_type_id: col.type_info().oid().map(|oid| oid.0).unwrap_or(0),
        })
        .collect()
}

/// One row as `{ column: value }`. Later duplicate names overwrite earlier ones.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut obj = Map::with_capacity(row.columns().len());
    for col in row.columns() {
        obj.insert(col.name().to_string(), extract_value(row, col.ordinal()));
    }
    Value::Object(obj)
}

fn float(f: f64) -> Value {
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}

fn or_null<T>(v: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    v.map(f).unwrap_or(Value::Null)
}

fn array<T>(v: Option<Vec<Option<T>>>, f: impl Fn(T) -> Value) -> Value {
    or_null(v, |items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&f).unwrap_or(Value::Null))
                .collect(),
        )
    })
}

pub fn bytea_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Scalars are tried first, then one-dimensional arrays, then the raw text.
pub fn extract_value(row: &PgRow, idx: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return or_null(v, |i| Value::from(i));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return or_null(v, |i| Value::from(i));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return or_null(v, |i| Value::from(i));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return or_null(v, Value::Bool);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return or_null(v, float);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return or_null(v, |f| float(f as f64));
    }
    // numeric stays a string so no precision is lost
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return or_null(v, |d| Value::String(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Uuid>, _>(idx) {
        return or_null(v, |u| Value::String(u.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return or_null(v, Value::String);
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(idx) {
        return v.unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return or_null(v, |b| Value::String(bytea_hex(&b)));
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return or_null(v, |dt| Value::String(dt.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<DateTime<FixedOffset>>, _>(idx) {
        return or_null(v, |dt| Value::String(dt.to_rfc3339()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return or_null(v, |dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return or_null(v, |d| Value::String(d.format("%Y-%m-%d").to_string()));
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
        return or_null(v, |t| Value::String(t.format("%H:%M:%S%.f").to_string()));
    }

    if let Ok(v) = row.try_get::<Option<Vec<Option<i64>>>, _>(idx) {
        return array(v, |i| Value::from(i));
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<i32>>>, _>(idx) {
        return array(v, |i| Value::from(i));
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<i16>>>, _>(idx) {
        return array(v, |i| Value::from(i));
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<bool>>>, _>(idx) {
        return array(v, Value::Bool);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<f64>>>, _>(idx) {
        return array(v, float);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<Decimal>>>, _>(idx) {
        return array(v, |d| Value::String(d.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<Uuid>>>, _>(idx) {
        return array(v, |u| Value::String(u.to_string()));
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<String>>>, _>(idx) {
        return array(v, Value::String);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<Value>>>, _>(idx) {
        return array(v, |j| j);
    }
    if let Ok(v) = row.try_get::<Option<Vec<Option<DateTime<Utc>>>>, _>(idx) {
        return array(v, |dt| Value::String(dt.to_rfc3339()));
    }

    if let Ok(v) = row.try_get::<Option<PgInterval>, _>(idx) {
        return or_null(v, |i| Value::String(interval_text(&i)));
    }
    if let Ok(v) = row.try_get::<Option<PgMoney>, _>(idx) {
        return or_null(v, |m| Value::String(money_text(m)));
    }
    if let Ok(v) = row.try_get::<Option<IpNetwork>, _>(idx) {
        let cidr = row
            .columns()
            .get(idx)
            .is_some_and(|col| col.type_info().name() == "CIDR");
        return or_null(v, |net| Value::String(network_text(net, cidr)));
    }
    if let Ok(v) = row.try_get::<Option<PgPoint>, _>(idx) {
        return or_null(v, |p| Value::String(format!("({},{})", p.x, p.y)));
    }

    raw_value(row, idx)
}

/// Last resort for types without a decoder above.
///
/// Text results are already PostgreSQL's own rendering. Binary results are
/// only readable for enums and extension types that send their text form;
/// anything else is emitted as `\x` hex rather than guessed at.
fn raw_value(row: &PgRow, idx: usize) -> Value {
    let Ok(raw) = row.try_get_raw(idx) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    match raw.format() {
        PgValueFormat::Text => raw
            .as_str()
            .map(|text| Value::String(text.to_string()))
            .unwrap_or(Value::Null),
        PgValueFormat::Binary => {
            let Ok(bytes) = raw.as_bytes() else {
                return Value::Null;
            };
            let textual = row.columns().get(idx).is_some_and(|col| {
                let ty = col.type_info();
                matches!(ty.kind(), PgTypeKind::Enum(_))
                    || (matches!(ty.kind(), PgTypeKind::Simple)
                        && ty.oid().is_some_and(|oid| oid.0 >= FIRST_USER_OID))
            });
            match std::str::from_utf8(bytes) {
                Ok(text) if textual => Value::String(text.to_string()),
                _ => Value::String(bytea_hex(bytes)),
            }
        }
    }
}

/// Types created by extensions or users start here.
const FIRST_USER_OID: u32 = 16_384;

/// PostgreSQL's default (`IntervalStyle = postgres`) rendering.
pub fn interval_text(interval: &PgInterval) -> String {
    let mut out = String::new();
    let mut prev_negative = false;

    let years = interval.months / 12;
    let months = interval.months % 12;
    for (value, unit) in [(years, "year"), (months, "mon"), (interval.days, "day")] {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        let sign = if prev_negative && value > 0 { "+" } else { "" };
        let plural = if value != 1 { "s" } else { "" };
        out.push_str(&format!("{sign}{value} {unit}{plural}"));
        prev_negative = value < 0;
    }

    let micros = interval.microseconds;
    if out.is_empty() || micros != 0 {
        let sign = if micros < 0 {
            "-"
        } else if prev_negative {
            "+"
        } else {
            ""
        };
        let abs = micros.unsigned_abs();
        let hours = abs / 3_600_000_000;
        let minutes = abs / 60_000_000 % 60;
        let seconds = abs / 1_000_000 % 60;
        let fraction = abs % 1_000_000;
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"));
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            out.push('.');
            out.push_str(digits.trim_end_matches('0'));
        }
    }
    out
}

/// `lc_monetary = C` style: `$1,234.50`, `-$0.99`.
pub fn money_text(money: PgMoney) -> String {
    let cents = money.0;
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if cents < 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", abs % 100)
}

/// `inet` drops a full-length prefix; `cidr` always shows it.
pub fn network_text(net: IpNetwork, cidr: bool) -> String {
    let full = match net {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if !cidr && net.prefix() == full {
        net.ip().to_string()
    } else {
        net.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytea_is_hex_escaped() {
        assert_eq!(bytea_hex(&[0xde, 0xad, 0x01]), "\\xdead01");
        assert_eq!(bytea_hex(&[]), "\\x");
    }

    #[test]
    fn non_finite_floats_become_strings() {
        assert_eq!(float(1.5), Value::from(1.5));
        assert_eq!(float(f64::NAN), Value::String("NaN".into()));
        assert_eq!(float(f64::INFINITY), Value::String("inf".into()));
    }

    #[test]
    fn intervals_render_like_postgres() {
        let iv = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(interval_text(&iv(0, 1, 0)), "1 day");
        assert_eq!(interval_text(&iv(0, 0, 0)), "00:00:00");
        assert_eq!(
            interval_text(&iv(14, 3, 14_706_500_000)),
            "1 year 2 mons 3 days 04:05:06.5"
        );
        assert_eq!(interval_text(&iv(0, -1, 0)), "-1 days");
        assert_eq!(interval_text(&iv(-1, 2, 0)), "-1 mons +2 days");
        assert_eq!(interval_text(&iv(0, 0, -90_000_000)), "-00:01:30");
        assert_eq!(interval_text(&iv(0, 0, 100 * 3_600_000_000)), "100:00:00");
    }

    #[test]
    fn money_is_grouped_with_two_decimals() {
        assert_eq!(money_text(PgMoney(123_456)), "$1,234.56");
        assert_eq!(money_text(PgMoney(-99)), "-$0.99");
        assert_eq!(money_text(PgMoney(100_000_000)), "$1,000,000.00");
    }

    #[test]
    fn inet_hides_host_prefix_but_cidr_keeps_it() {
        let host: IpNetwork = "10.0.0.1/32".parse().expect("valid network");
        let net: IpNetwork = "10.0.0.0/8".parse().expect("valid network");
        assert_eq!(network_text(host, false), "10.0.0.1");
        assert_eq!(network_text(host, true), "10.0.0.1/32");
        assert_eq!(network_text(net, false), "10.0.0.0/8");
    }

    #[test]
    fn arrays_keep_null_elements() {
        let v = array(Some(vec![Some(1_i64), None, Some(3)]), Value::from);
        assert_eq!(v, serde_json::json!([1, null, 3]));
        assert_eq!(array::<i64>(None, Value::from), Value::Null);
    }
}
