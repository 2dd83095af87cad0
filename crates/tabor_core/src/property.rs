//! Property record codec.
//!
//! A settings save only stores values that differ from their defaults. Each
//! stored value is a self-describing record:
//!
//! ```text
//! key_len(4) key \0 type_len(4) type \0 padding(8) value \0
//! ```
//!
//! Both length headers count the trailing terminator and only their low byte
//! is populated, so names are limited to [`MAX_NAME_LEN`] encoded bytes.

use std::fmt;
use std::io::Cursor;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core_api::{CoreError, CoreErrorCode};
use crate::layout::ByteRange;
use crate::reader::LittleEndianReader;

pub const LENGTH_HEADER_LEN: usize = 4;
pub const PADDING_LEN: usize = 8;
pub const MAX_NAME_LEN: usize = 255;

pub const BOOL_PROPERTY: &str = "BoolProperty";
pub const BYTE_PROPERTY: &str = "ByteProperty";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Convert a JSON scalar into a property value.
    ///
    /// Arrays are accepted as raw byte sequences when every element fits in a byte.
    pub fn from_json(value: &JsonValue) -> Result<Self, CoreError> {
        match value {
            JsonValue::Bool(b) => Ok(Self::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Ok(Self::Int(v))
                } else if n.as_u64().is_some() {
                    Err(CoreError::new(
                        CoreErrorCode::ValueOutOfRange,
                        format!("integer value {n} does not fit in a single byte"),
                    ))
                } else {
                    Err(CoreError::new(
                        CoreErrorCode::UnsupportedValueType,
                        format!("unsupported numeric value {n}; only integers are supported"),
                    ))
                }
            }
            JsonValue::String(s) => Ok(Self::Str(s.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or_else(|| {
                            CoreError::new(
                                CoreErrorCode::UnsupportedValueType,
                                format!("byte sequence element {item} is not in 0..=255"),
                            )
                        })
                })
                .collect::<Result<Vec<u8>, CoreError>>()
                .map(Self::Bytes),
            other => Err(CoreError::new(
                CoreErrorCode::UnsupportedValueType,
                format!("unsupported value type: {}", json_kind(other)),
            )),
        }
    }

    /// Serialized value bytes, without the record's trailing terminator.
    pub fn encode(&self) -> Result<Vec<u8>, CoreError> {
        match self {
            Self::Bool(b) => Ok(vec![u8::from(*b)]),
            Self::Int(v) => u8::try_from(*v).map(|b| vec![b]).map_err(|_| {
                CoreError::new(
                    CoreErrorCode::ValueOutOfRange,
                    format!("integer value {v} does not fit in a single byte"),
                )
            }),
            Self::Str(s) => Ok(s.as_bytes().to_vec()),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    /// Compare against a default, treating `true`/`false` and `1`/`0` as equal.
    pub fn matches_default(&self, default: &PropertyValue) -> bool {
        match (self.as_integer(), default.as_integer()) {
            (Some(a), Some(b)) => a == b,
            _ => self == default,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match *self {
            Self::Bool(b) => Some(i64::from(b)),
            Self::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(bytes) => {
                f.write_str("[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{b:02x}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// A fully encoded property record, ready to be spliced into a save buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    key: String,
    type_tag: String,
    value: PropertyValue,
    bytes: Vec<u8>,
}

impl PropertyRecord {
    pub fn new(
        key: impl Into<String>,
        type_tag: impl Into<String>,
        value: PropertyValue,
    ) -> Result<Self, CoreError> {
        let key = key.into();
        let type_tag = type_tag.into();
        validate_name("key", &key)?;
        validate_name("type tag", &type_tag)?;
        let value_bytes = value.encode()?;

        let capacity = 2 * LENGTH_HEADER_LEN
            + key.len()
            + type_tag.len()
            + PADDING_LEN
            + value_bytes.len()
            + 3;
        let mut bytes = Vec::with_capacity(capacity);
        push_name(&mut bytes, &key);
        push_name(&mut bytes, &type_tag);
        bytes.extend_from_slice(&[0u8; PADDING_LEN]);
        bytes.extend_from_slice(&value_bytes);
        bytes.push(0);

        Ok(Self {
            key,
            type_tag,
            value,
            bytes,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoded_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub(crate) fn validate_name(label: &str, name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::new(
            CoreErrorCode::InvalidName,
            format!("property {label} must not be empty"),
        ));
    }
    if name.as_bytes().contains(&0) {
        return Err(CoreError::new(
            CoreErrorCode::InvalidName,
            format!("property {label} {name:?} contains a null byte"),
        ));
    }
    let encoded = name.len() + 1;
    if encoded > MAX_NAME_LEN {
        return Err(CoreError::new(
            CoreErrorCode::NameTooLong,
            format!(
                "property {label} is {encoded} bytes with terminator, limit is {MAX_NAME_LEN}"
            ),
        ));
    }
    Ok(())
}

fn push_name(out: &mut Vec<u8>, name: &str) {
    // validate_name keeps this within the low header byte
    let encoded = (name.len() + 1) as u32;
    out.extend_from_slice(&encoded.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
}

/// A record that is already present in a save buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistingRecord {
    pub key: String,
    pub type_tag: String,
    /// Bytes of the record that were understood. Ends after the padding when the
    /// value kind is not a single byte.
    pub range: ByteRange,
    pub value: Option<PropertyValue>,
}

impl ExistingRecord {
    /// Describe the record whose null-terminated key starts at `key_offset`.
    pub fn read_at(buffer: &[u8], key_offset: usize) -> Result<Self, CoreError> {
        let Some(start) = key_offset.checked_sub(LENGTH_HEADER_LEN) else {
            return Err(CoreError::new(
                CoreErrorCode::Parse,
                format!("key at offset {key_offset} has no room for a length header"),
            ));
        };

        let mut r = LittleEndianReader::new(Cursor::new(buffer));
        r.seek_to(start as u64)?;
        let key = read_name(&mut r, "key")?;
        let type_tag = read_name(&mut r, "type tag")?;

        let padding_end = r.position()? + PADDING_LEN as u64;
        if padding_end > r.len()? {
            return Err(CoreError::new(
                CoreErrorCode::Parse,
                format!("record {key:?} is truncated inside its padding"),
            ));
        }
        r.skip(PADDING_LEN as u64)?;

        let value = match type_tag.as_str() {
            BOOL_PROPERTY => Some(PropertyValue::Bool(r.read_u8()? != 0)),
            BYTE_PROPERTY => Some(PropertyValue::Int(i64::from(r.read_u8()?))),
            _ => None,
        };
        if value.is_some() {
            let terminator = r.read_u8()?;
            if terminator != 0 {
                return Err(CoreError::new(
                    CoreErrorCode::Parse,
                    format!("record {key:?} value is not followed by a terminator"),
                ));
            }
        }

        let end = r.position()? as usize;
        Ok(Self {
            key,
            type_tag,
            range: ByteRange::new(start, end),
            value,
        })
    }
}

fn read_name(
    r: &mut LittleEndianReader<Cursor<&[u8]>>,
    label: &str,
) -> Result<String, CoreError> {
    let declared = r.read_u32()? as usize;
    let name = r.read_null_terminated_string(MAX_NAME_LEN)?;
    if declared != name.len() + 1 {
        return Err(CoreError::new(
            CoreErrorCode::Parse,
            format!(
                "{label} {name:?} declares length {declared}, found {}",
                name.len() + 1
            ),
        ));
    }
    Ok(name)
}
