//! PostgreSQL row source.

use crate::driver::RowSource;
use crate::{Result, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dataproducts_validator::{DataRow, DataValue};
use futures::StreamExt;
use std::error::Error;
use std::fmt::Write;
use std::pin::Pin;
use tokio::task::JoinHandle;
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Client, NoTls, Row, RowStream};
use tracing::{debug, warn};

pub(crate) struct PostgresSource {
    client: Client,
    rows: Pin<Box<RowStream>>,
    connection: JoinHandle<()>,
}

impl PostgresSource {
    pub(crate) async fn open(dsn: &str, query: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|e| SourceError::Connection(format!("PostgreSQL connection failed: {e}")))?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection error: {e}");
            }
        });

        let rows = match client.query_raw(query, std::iter::empty::<&str>()).await {
            Ok(rows) => rows,
            Err(e) => {
                connection.abort();
                return Err(SourceError::Postgres(e));
            }
        };
        debug!("PostgreSQL query started");

        Ok(Self {
            client,
            rows: Box::pin(rows),
            connection,
        })
    }
}

#[async_trait]
impl RowSource for PostgresSource {
    async fn next_row(&mut self) -> Option<Result<DataRow>> {
        let row = self.rows.next().await?;
        Some(row.map_err(SourceError::from).and_then(|row| decode_row(&row)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let PostgresSource {
            client,
            rows,
            connection,
        } = *self;
        drop(rows);
        drop(client);
        connection.abort();

        match connection.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(SourceError::Connection(format!(
                "PostgreSQL connection task failed: {e}"
            ))),
        }
    }
}

fn decode_row(row: &Row) -> Result<DataRow> {
    let mut out = DataRow::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, idx, column.type_())?;
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &Row, idx: usize, ty: &Type) -> Result<DataValue> {
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(DataValue::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| DataValue::Int(v.into())),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| DataValue::Int(v.into())),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(DataValue::Int),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| DataValue::Int(v.into())),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| DataValue::Float(v.into())),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(DataValue::Float),
        "numeric" => row
            .try_get::<_, Option<PgNumeric>>(idx)?
            .map(|v| DataValue::String(v.0)),
        "timestamp" => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|v| DataValue::Timestamp(v.and_utc())),
        "timestamptz" => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(DataValue::Timestamp),
        "date" => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| DataValue::Timestamp(v.and_time(NaiveTime::MIN).and_utc())),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| DataValue::String(v.to_string())),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)?
            .map(|v| DataValue::String(v.to_string())),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map(|v| DataValue::String(String::from_utf8_lossy(&v).into_owned())),
        // Text, enums and text domains; other types must be cast with ::text
        _ => row
            .try_get::<_, Option<PgText>>(idx)
            .map_err(|e| SourceError::Decode {
                column: row.columns()[idx].name().to_string(),
                message: format!("unsupported type {ty}, cast it to text in the query: {e}"),
            })?
            .map(|v| DataValue::String(v.0)),
    };
    Ok(value.unwrap_or(DataValue::Null))
}

/// Any value whose binary format is its UTF-8 text.
struct PgText(String);

impl<'a> FromSql<'a> for PgText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(PgText(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        match ty.kind() {
            Kind::Enum(_) => true,
            Kind::Domain(base) => Self::accepts(base),
            _ => <String as FromSql>::accepts(ty),
        }
    }
}

/// NUMERIC rendered as its exact decimal text.
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, Box<dyn Error + Sync + Send>> {
        decode_numeric(raw).map(PgNumeric)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decodes the binary NUMERIC wire format: a header of digit count, weight,
/// sign and display scale, followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> std::result::Result<String, Box<dyn Error + Sync + Send>> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC header".into());
    }
    let read = |i: usize| u16::from_be_bytes([raw[i], raw[i + 1]]);

    let ndigits = usize::from(read(0));
    let weight = i32::from(read(2) as i16);
    let sign = read(4);
    let dscale = usize::from(read(6));

    if raw.len() != 8 + ndigits * 2 {
        return Err("invalid NUMERIC length".into());
    }

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid NUMERIC sign 0x{other:04X}").into()),
    }

    let digits: Vec<u16> = (0..ndigits).map(|i| read(8 + 2 * i)).collect();
    let digit = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            let d = digit(i);
            if i == 0 {
                write!(out, "{d}")?;
            } else {
                write!(out, "{d:04}")?;
            }
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", digit(i))?;
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn numeric(weight: i16, sign: u16, dscale: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn mood() -> Type {
        Type::new(
            "mood".to_string(),
            16_400,
            Kind::Enum(vec!["happy".to_string(), "sad".to_string()]),
            "public".to_string(),
        )
    }

    #[test]
    fn test_text_accepts_enums_and_text_domains() {
        assert!(<PgText as FromSql>::accepts(&mood()));
        assert!(<PgText as FromSql>::accepts(&Type::TEXT));
        assert!(<PgText as FromSql>::accepts(&Type::VARCHAR));

        let email = Type::new(
            "email".to_string(),
            16_401,
            Kind::Domain(Type::TEXT),
            "public".to_string(),
        );
        assert!(<PgText as FromSql>::accepts(&email));

        assert!(!<PgText as FromSql>::accepts(&Type::INTERVAL));
        assert!(!<PgText as FromSql>::accepts(&Type::INET));
    }

    #[test]
    fn test_enum_label_decodes_as_text() {
        let value = PgText::from_sql(&mood(), b"happy").unwrap();
        assert_eq!(value.0, "happy");
        assert!(PgText::from_sql(&mood(), &[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_numeric_with_scale() {
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_POS, 2, &[12, 3400])).unwrap(), "12.34");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_NEG, 2, &[12, 3400])).unwrap(), "-12.34");
    }

    #[test]
    fn test_numeric_fraction_only() {
        assert_eq!(decode_numeric(&numeric(-1, NUMERIC_POS, 2, &[500])).unwrap(), "0.05");
        assert_eq!(decode_numeric(&numeric(-1, NUMERIC_POS, 4, &[5])).unwrap(), "0.0005");
        assert_eq!(
            decode_numeric(&numeric(-2, NUMERIC_POS, 8, &[5])).unwrap(),
            "0.00000005"
        );
    }

    #[test]
    fn test_numeric_trailing_zero_groups() {
        assert_eq!(decode_numeric(&numeric(1, NUMERIC_POS, 0, &[1])).unwrap(), "10000");
        assert_eq!(decode_numeric(&numeric(1, NUMERIC_POS, 2, &[1])).unwrap(), "10000.00");
    }

    #[test]
    fn test_numeric_zero() {
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_POS, 0, &[])).unwrap(), "0");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_POS, 2, &[])).unwrap(), "0.00");
    }

    #[test]
    fn test_numeric_special_values() {
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_NAN, 0, &[])).unwrap(), "NaN");
        assert_eq!(decode_numeric(&numeric(0, NUMERIC_NINF, 0, &[])).unwrap(), "-Infinity");
    }

    #[test]
    fn test_numeric_malformed() {
        assert!(decode_numeric(&[0, 1]).is_err());
        assert!(decode_numeric(&numeric(0, NUMERIC_POS, 0, &[1])[..9]).is_err());
        assert!(decode_numeric(&numeric(0, 0x1234, 0, &[1])).is_err());
    }
}
