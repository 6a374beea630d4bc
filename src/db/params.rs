//! JSON parameters bound against the types the server inferred for a statement.
//!
//! The dashboard sends every parameter as plain JSON (timestamps as ISO strings,
//! JSONB columns as `JSON.stringify` output) and expects the server to decide
//! what each placeholder means. So the statement is prepared first and every
//! value is converted to the type PostgreSQL reported for its placeholder.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::PgMoney;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgTypeKind, Postgres};
use sqlx::types::Json;
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::{Type, TypeInfo};
use thiserror::Error;
use uuid::Uuid;

/// Types created by extensions or users start here.
const FIRST_USER_OID: u32 = 16_384;

mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const JSON: u32 = 114;
    pub const CIDR: u32 = 650;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const UNKNOWN: u32 = 705;
    pub const MONEY: u32 = 790;
    pub const INET: u32 = 869;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIME: u32 = 1083;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const JSONB: u32 = 3802;
}

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("bind message supplies {supplied} parameters, but prepared statement requires {expected}")]
    Count { supplied: usize, expected: usize },

    #[error("parameter ${position}: invalid input for type {type_name}: {value}")]
    Invalid {
        position: usize,
        type_name: String,
        value: String,
    },

    #[error(
        "parameter ${position}: type {type_name} cannot be bound from JSON; cast the placeholder, e.g. ${position}::text::{type_name}"
    )]
    Unsupported { position: usize, type_name: String },
}

/// A JSON value already converted to the Rust type matching its placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(Decimal),
    Money(Decimal),
    /// Text on the wire; also used for enums and extension types whose binary form is their text.
    Text(String),
    Uuid(Uuid),
    Json(Value),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Timestamptz(DateTime<Utc>),
    Bytea(Vec<u8>),
    Inet(IpNetwork),
    Array { elem_oid: u32, items: Vec<Coerced> },
}

/// One bound parameter: the converted value and the type the server expects.
#[derive(Debug, Clone)]
pub struct PgParam {
    ty: PgTypeInfo,
    value: Coerced,
}

impl PgParam {
    pub fn value(&self) -> &Coerced {
        &self.value
    }
}

/// Pair every JSON parameter with the statement's inferred parameter type.
pub fn coerce_all(params: &[Value], types: &[PgTypeInfo]) -> Result<Vec<PgParam>, ParamError> {
    if params.len() != types.len() {
        return Err(ParamError::Count {
            supplied: params.len(),
            expected: types.len(),
        });
    }
    params
        .iter()
        .zip(types)
        .enumerate()
        .map(|(i, (value, ty))| {
            let coerced = coerce(value, ty).map_err(|reason| reason.at(i + 1, ty, value))?;
            Ok(PgParam {
                ty: ty.clone(),
                value: coerced,
            })
        })
        .collect()
}

/// Why a single value did not convert; the position is attached by the caller.
#[derive(Debug, PartialEq)]
enum Reject {
    Invalid,
    Unsupported,
}

impl Reject {
    fn at(self, position: usize, ty: &PgTypeInfo, value: &Value) -> ParamError {
        let type_name = ty.name().to_lowercase();
        match self {
            Reject::Invalid => ParamError::Invalid {
                position,
                type_name,
                value: to_text(value),
            },
            Reject::Unsupported => ParamError::Unsupported {
                position,
                type_name,
            },
        }
    }
}

fn coerce(value: &Value, ty: &PgTypeInfo) -> Result<Coerced, Reject> {
    if value.is_null() {
        return Ok(Coerced::Null);
    }
    let Some(type_oid) = ty.oid().map(|o| o.0) else {
        return Err(Reject::Unsupported);
    };

    let coerced = match type_oid {
        oid::BOOL => to_bool(value).map(Coerced::Bool),
        oid::INT2 => to_i64(value)
            .and_then(|i| i16::try_from(i).ok())
            .map(Coerced::Int2),
        oid::INT4 => to_i64(value)
            .and_then(|i| i32::try_from(i).ok())
            .map(Coerced::Int4),
        oid::INT8 => to_i64(value).map(Coerced::Int8),
        oid::FLOAT4 => to_f64(value).map(|f| Coerced::Float4(f as f32)),
        oid::FLOAT8 => to_f64(value).map(Coerced::Float8),
        oid::NUMERIC => to_decimal(value).map(Coerced::Numeric),
        oid::MONEY => to_decimal(value).map(Coerced::Money),
        oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::NAME | oid::UNKNOWN => {
            Some(Coerced::Text(to_text(value)))
        }
        oid::UUID => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(Coerced::Uuid),
        oid::JSON | oid::JSONB => to_json(value).map(Coerced::Json),
        oid::DATE => value.as_str().and_then(parse_date).map(Coerced::Date),
        oid::TIME => value.as_str().and_then(parse_time).map(Coerced::Time),
        oid::TIMESTAMP => value
            .as_str()
            .and_then(parse_timestamp)
            .map(Coerced::Timestamp),
        oid::TIMESTAMPTZ => value
            .as_str()
            .and_then(parse_timestamptz)
            .map(Coerced::Timestamptz),
        oid::BYTEA => value.as_str().and_then(parse_bytea).map(Coerced::Bytea),
        oid::INET | oid::CIDR => value
            .as_str()
            .and_then(|s| IpNetwork::from_str(s.trim()).ok())
            .map(Coerced::Inet),
        _ => return coerce_by_kind(value, ty, type_oid),
    };
    coerced.ok_or(Reject::Invalid)
}

fn coerce_by_kind(value: &Value, ty: &PgTypeInfo, type_oid: u32) -> Result<Coerced, Reject> {
    match ty.kind() {
        PgTypeKind::Array(elem) => {
            let Value::Array(items) = value else {
                return Err(Reject::Invalid);
            };
            let elem_oid = elem.oid().map(|o| o.0).ok_or(Reject::Unsupported)?;
            let items = items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => Err(Reject::Unsupported),
                    item => coerce(item, elem),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Coerced::Array { elem_oid, items })
        }
        PgTypeKind::Domain(base) => coerce(value, base),
        PgTypeKind::Enum(_) => Ok(Coerced::Text(to_text(value))),
        PgTypeKind::Simple if type_oid >= FIRST_USER_OID => Ok(Coerced::Text(to_text(value))),
        _ => Err(Reject::Unsupported),
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Strings pass through; other scalars use their JSON spelling.
fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A string is taken as JSON text, anything else as the JSON value itself.
fn to_json(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok(),
        other => Some(other.clone()),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|dt| dt.date()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// Wall-clock reading of the literal; a zone suffix is ignored as PostgreSQL does.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Literals without an offset are read as UTC.
fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_timestamp(s).map(|naive| naive.and_utc()))
}

/// `\x`-prefixed hex, otherwise the string's own bytes.
fn parse_bytea(s: &str) -> Option<Vec<u8>> {
    let Some(hex) = s.strip_prefix("\\x") else {
        return Some(s.as_bytes().to_vec());
    };
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

impl Coerced {
    fn encode_into(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match self {
            Coerced::Null => Ok(IsNull::Yes),
            Coerced::Bool(v) => <bool as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Int2(v) => <i16 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Int4(v) => <i32 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Int8(v) => <i64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Float4(v) => <f32 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Float8(v) => <f64 as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Numeric(v) => <Decimal as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Money(v) => {
                <PgMoney as Encode<'_, Postgres>>::encode_by_ref(&PgMoney::from_decimal(*v, 2), buf)
            }
            Coerced::Text(v) => <String as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Uuid(v) => <Uuid as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Json(v) => <Json<&Value> as Encode<'_, Postgres>>::encode_by_ref(&Json(v), buf),
            Coerced::Date(v) => <NaiveDate as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Time(v) => <NaiveTime as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Timestamp(v) => <NaiveDateTime as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Timestamptz(v) => <DateTime<Utc> as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Bytea(v) => <Vec<u8> as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Inet(v) => <IpNetwork as Encode<'_, Postgres>>::encode_by_ref(v, buf),
            Coerced::Array { elem_oid, items } => encode_array(*elem_oid, items, buf),
        }
    }
}

/// One-dimensional array in PostgreSQL's binary array layout.
fn encode_array(
    elem_oid: u32,
    items: &[Coerced],
    buf: &mut PgArgumentBuffer,
) -> Result<IsNull, BoxDynError> {
    let has_nulls = items.iter().any(|item| *item == Coerced::Null);
    let len = i32::try_from(items.len())?;

    buf.extend_from_slice(&1_i32.to_be_bytes());
    buf.extend_from_slice(&i32::from(has_nulls).to_be_bytes());
    buf.extend_from_slice(&elem_oid.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&1_i32.to_be_bytes());

    for item in items {
        let start = buf.len();
        buf.extend_from_slice(&[0; 4]);
        let size = match item.encode_into(buf)? {
            IsNull::Yes => {
                buf.truncate(start + 4);
                -1
            }
            IsNull::No => i32::try_from(buf.len() - start - 4)?,
        };
        buf[start..start + 4].copy_from_slice(&size.to_be_bytes());
    }
    Ok(IsNull::No)
}

impl Type<Postgres> for PgParam {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

impl Encode<'_, Postgres> for PgParam {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        self.value.encode_into(buf)
    }

    /// The placeholder's own type, so the bind message matches the prepared statement.
    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.ty.clone())
    }
}
