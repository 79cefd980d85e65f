//! On-disk representations of the ledger and format auto-detection.
//!
//! Three encodings are supported. Detection tries them from the most
//! restrictive to the least restrictive: binary (magic header), JSON,
//! then the two-column tabular form. Every attempt sees the complete input
//! and reports a [`DecodeFailure`] value instead of unwinding.

use crate::error::DecodeFailure;
use crate::tabular;
use crate::types::{Record, Records, UserId};
use bincode::Options;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::ser::{Formatter, PrettyFormatter};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Leading bytes of a binary ledger file.
const BINARY_MAGIC: &[u8; 4] = b"FLDG";
const BINARY_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Opaque `bincode` payload behind a magic header.
    Binary,
    /// Sorted keys, two-space indent, `,`/`:` separators.
    #[default]
    Json,
    /// `key,value` rows; the value is the record as compact JSON.
    Tabular,
}

impl Format {
    /// Order in which [`decode_any`] tries the formats.
    pub const DETECTION_ORDER: [Format; 3] = [Format::Binary, Format::Json, Format::Tabular];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Json => "json",
            Self::Tabular => "tabular",
        }
    }

    /// Serialize the whole mapping into `writer`.
    pub fn encode<W: Write>(self, records: &Records, writer: &mut W) -> io::Result<()> {
        match self {
            Self::Binary => encode_binary(records, writer),
            Self::Json => encode_json(records, writer),
            Self::Tabular => encode_tabular(records, writer),
        }
    }

    /// Decode a complete file body in this format.
    pub fn decode(self, bytes: &[u8]) -> Result<Records, DecodeFailure> {
        let result = match self {
            Self::Binary => decode_binary(bytes),
            Self::Json => serde_json::from_slice::<Records>(bytes).map_err(|e| e.to_string()),
            Self::Tabular => decode_tabular(bytes),
        };
        result.map_err(|reason| DecodeFailure {
            format: self,
            reason,
        })
    }

    /// First format in detection order that decodes `bytes`.
    pub fn detect(bytes: &[u8]) -> Option<Format> {
        decode_any(bytes).ok().map(|(format, _)| format)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            "tabular" | "csv" => Ok(Self::Tabular),
            other => Err(format!(
                "unknown format {other:?} (expected binary, json or tabular)"
            )),
        }
    }
}

/// Try every format in [`Format::DETECTION_ORDER`], stopping at the first
/// success. On failure all attempts are returned in order.
pub fn decode_any(bytes: &[u8]) -> Result<(Format, Records), Vec<DecodeFailure>> {
    let mut failures = Vec::with_capacity(Format::DETECTION_ORDER.len());
    for format in Format::DETECTION_ORDER {
        match format.decode(bytes) {
            Ok(records) => return Ok((format, records)),
            Err(failure) => {
                tracing::debug!("ledger decode attempt failed: {failure}");
                failures.push(failure);
            }
        }
    }
    Err(failures)
}

// ── Binary ───────────────────────────────────────────────────────

/// Record layout for the non-self-describing binary codec. The text formats
/// omit unset fields, which bincode cannot express.
#[derive(Serialize, Deserialize)]
struct BinaryRecord {
    followed_at: NaiveDateTime,
    unfollowed_at: Option<NaiveDateTime>,
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn encode_binary<W: Write>(records: &Records, writer: &mut W) -> io::Result<()> {
    let wire: BTreeMap<&str, BinaryRecord> = records
        .iter()
        .map(|(id, record)| {
            (
                id.as_str(),
                BinaryRecord {
                    followed_at: record.followed_at,
                    unfollowed_at: record.unfollowed_at,
                },
            )
        })
        .collect();

    writer.write_all(BINARY_MAGIC)?;
    writer.write_all(&[BINARY_VERSION])?;
    bincode_options()
        .serialize_into(writer, &wire)
        .map_err(io::Error::other)
}

fn decode_binary(bytes: &[u8]) -> Result<Records, String> {
    let body = bytes
        .strip_prefix(BINARY_MAGIC.as_slice())
        .ok_or_else(|| "missing binary header".to_string())?;
    let (version, payload) = body
        .split_first()
        .ok_or_else(|| "truncated binary header".to_string())?;
    if *version != BINARY_VERSION {
        return Err(format!("unsupported binary version {version}"));
    }

    let wire: BTreeMap<String, BinaryRecord> = bincode_options()
        .deserialize(payload)
        .map_err(|e| e.to_string())?;

    Ok(wire
        .into_iter()
        .map(|(id, r)| {
            (
                UserId::from(id),
                Record {
                    followed_at: r.followed_at,
                    unfollowed_at: r.unfollowed_at,
                },
            )
        })
        .collect())
}

// ── JSON ─────────────────────────────────────────────────────────

/// Pretty printer with two-space indent and no space after `:`.
struct LedgerJsonFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl LedgerJsonFormatter<'_> {
    fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(b"  "),
        }
    }
}

// `begin_object_value` keeps the default bare `:`.
impl Formatter for LedgerJsonFormatter<'_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}

fn encode_json<W: Write>(records: &Records, writer: &mut W) -> io::Result<()> {
    let mut ser = serde_json::Serializer::with_formatter(writer, LedgerJsonFormatter::new());
    records.serialize(&mut ser).map_err(io::Error::from)
}

// ── Tabular ──────────────────────────────────────────────────────

fn encode_tabular<W: Write>(records: &Records, writer: &mut W) -> io::Result<()> {
    for (id, record) in records {
        let value = serde_json::to_string(record).map_err(io::Error::from)?;
        tabular::write_row(writer, &[id.as_str(), value.as_str()])?;
    }
    Ok(())
}

fn decode_tabular(bytes: &[u8]) -> Result<Records, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    let mut records = Records::new();

    for (index, row) in tabular::parse_rows(text)?.into_iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let [key, value]: [String; 2] = row
            .try_into()
            .map_err(|row: Vec<String>| format!("row {} has {} columns, expected 2", index + 1, row.len()))?;
        let record = parse_tabular_value(&value)
            .ok_or_else(|| format!("row {}: unreadable value {value:?}", index + 1))?;
        records.insert(UserId::from(key), record);
    }

    Ok(records)
}

/// A value is either a compact JSON record or a bare follow timestamp.
fn parse_tabular_value(value: &str) -> Option<Record> {
    let value = value.trim();
    if value.starts_with('{') {
        return serde_json::from_str(value).ok();
    }
    value.parse::<NaiveDateTime>().ok().map(Record::followed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sample() -> Records {
        let mut records = Records::new();
        records.insert(UserId::from("b-user"), Record::followed(ts(2, 9)));
        records.insert(
            UserId::from("a-user"),
            Record {
                followed_at: ts(1, 0),
                unfollowed_at: Some(ts(5, 12)),
            },
        );
        records.insert(UserId::from("comma,\"quoted\""), Record::followed(ts(3, 18)));
        records
    }

    fn encoded(format: Format, records: &Records) -> Vec<u8> {
        let mut buf = Vec::new();
        format.encode(records, &mut buf).unwrap();
        buf
    }

    #[test]
    fn every_format_round_trips() {
        let records = sample();
        for format in Format::DETECTION_ORDER {
            let decoded = format.decode(&encoded(format, &records)).unwrap();
            assert_eq!(decoded, records, "{format} did not round-trip");
        }
    }

    #[test]
    fn json_layout_matches_ledger_convention() {
        let mut records = Records::new();
        records.insert(UserId::from("u2"), Record::followed(ts(2, 0)));
        records.insert(UserId::from("u1"), Record::followed(ts(1, 0)));

        let text = String::from_utf8(encoded(Format::Json, &records)).unwrap();
        assert_eq!(
            text,
            "{\n  \"u1\":{\n    \"followed_at\":\"2024-01-01T00:00:00\"\n  },\n  \"u2\":{\n    \"followed_at\":\"2024-01-02T00:00:00\"\n  }\n}"
        );
    }

    #[test]
    fn tabular_quotes_fields_that_need_it() {
        let mut records = Records::new();
        records.insert(UserId::from("u1"), Record::followed(ts(1, 0)));
        let text = String::from_utf8(encoded(Format::Tabular, &records)).unwrap();
        assert_eq!(
            text,
            "u1,\"{\"\"followed_at\"\":\"\"2024-01-01T00:00:00\"\"}\"\r\n"
        );
    }

    #[test]
    fn tabular_accepts_bare_timestamps() {
        let records = Format::Tabular
            .decode(b"123,2024-01-01T00:00:00\n456,2024-01-02T00:00:00\n")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["123"].followed_at, ts(1, 0));
    }

    #[test]
    fn detection_prefers_most_restrictive_format() {
        let records = sample();
        for format in Format::DETECTION_ORDER {
            let (detected, decoded) = decode_any(&encoded(format, &records)).unwrap();
            assert_eq!(detected, format);
            assert_eq!(decoded, records);
        }
    }

    #[test]
    fn binary_header_is_checked_before_payload() {
        let failure = Format::Binary.decode(b"{\"u1\":{}}").unwrap_err();
        assert_eq!(failure.format, Format::Binary);
        assert!(failure.reason.contains("header"));

        let mut bytes = encoded(Format::Binary, &sample());
        bytes[4] = 9;
        assert!(Format::Binary.decode(&bytes).unwrap_err().reason.contains("version 9"));
    }

    #[test]
    fn garbage_reports_all_attempts() {
        let failures = decode_any(b"\xff\xfe not a ledger").unwrap_err();
        let formats: Vec<Format> = failures.iter().map(|f| f.format).collect();
        assert_eq!(formats, Format::DETECTION_ORDER.to_vec());
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        let failure = Format::Tabular.decode(b"u1,2024-01-01T00:00:00,extra\n").unwrap_err();
        assert!(failure.reason.contains("3 columns"));
    }

    #[test]
    fn empty_input_is_an_empty_table() {
        let (format, records) = decode_any(b"").unwrap();
        assert_eq!(format, Format::Tabular);
        assert!(records.is_empty());
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("csv".parse::<Format>().unwrap(), Format::Tabular);
        assert_eq!("bin".parse::<Format>().unwrap(), Format::Binary);
        assert!("yaml".parse::<Format>().is_err());
    }
}
