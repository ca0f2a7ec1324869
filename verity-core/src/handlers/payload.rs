//! Decoding of Move event payload fields.
//!
//! `vector<u8>` arrives as a `0x`-prefixed hex string, `u64` as a decimal
//! string or a JSON number, `address` as a hex string.

use crate::utils::json::u64_from_json;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` is not valid hex: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("field `{field}` is out of range")]
    OutOfRange { field: &'static str },
}

/// Borrowed view over the fields of one event payload.
pub struct Payload<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Payload<'a> {
    pub fn new(data: &'a Value) -> Result<Self, DecodeError> {
        match data {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(DecodeError::NotAnObject),
        }
    }

    fn field(&self, field: &'static str) -> Result<&'a Value, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
            Some(value) => Ok(value),
        }
    }

    fn string(&self, field: &'static str) -> Result<&'a str, DecodeError> {
        self.field(field)?.as_str().ok_or(DecodeError::WrongType {
            field,
            expected: "a string",
        })
    }

    /// External record id, normalized to lowercase.
    pub fn id(&self, field: &'static str) -> Result<String, DecodeError> {
        let id = self.string(field)?.trim();
        if id.is_empty() {
            return Err(DecodeError::MissingField(field));
        }
        Ok(id.to_ascii_lowercase())
    }

    pub fn address(&self, field: &'static str) -> Result<String, DecodeError> {
        Ok(self.string(field)?.trim().to_ascii_lowercase())
    }

    /// `vector<u8>` field interpreted as UTF-8 text.
    pub fn text(&self, field: &'static str) -> Result<String, DecodeError> {
        hex_to_text(field, self.string(field)?)
    }

    /// Like [`text`](Self::text), but a missing field decodes to "".
    pub fn optional_text(&self, field: &'static str) -> Result<String, DecodeError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(String::new()),
            Some(_) => self.text(field),
        }
    }

    pub fn u64(&self, field: &'static str) -> Result<u64, DecodeError> {
        u64_from_json(self.field(field)?).ok_or(DecodeError::WrongType {
            field,
            expected: "an unsigned 64-bit integer",
        })
    }

    /// `u64` widened into a signed column.
    pub fn i64(&self, field: &'static str) -> Result<i64, DecodeError> {
        i64::try_from(self.u64(field)?).map_err(|_| DecodeError::OutOfRange { field })
    }

    /// `u64` coin amount widened into a decimal.
    pub fn amount(&self, field: &'static str) -> Result<Decimal, DecodeError> {
        Ok(Decimal::from(self.u64(field)?))
    }

    pub fn bool(&self, field: &'static str) -> Result<bool, DecodeError> {
        match self.field(field)? {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s == "true" => Ok(true),
            Value::String(s) if s == "false" => Ok(false),
            _ => Err(DecodeError::WrongType {
                field,
                expected: "a boolean",
            }),
        }
    }
}

/// Decodes `0x`-prefixed hex bytes as UTF-8, replacing invalid sequences.
pub fn hex_to_text(field: &'static str, raw: &str) -> Result<String, DecodeError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .or_else(|| raw.trim().strip_prefix("0X"))
        .unwrap_or(raw.trim());
    let bytes = hex::decode(digits).map_err(|source| DecodeError::InvalidHex { field, source })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
