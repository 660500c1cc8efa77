//! Row payload encoding.
//!
//! A record is serialized as:
//!
//! - column count: 1 byte
//! - one type code per column (text codes carry the text length)
//! - each column's value bytes, in column order
//!
//! Numbers are big-endian. Null placeholders occupy zero-filled bytes of
//! their width. Text is written as raw UTF-8 with no terminator.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::data_type::{DataType, MAX_TEXT_LENGTH};

/// Maximum number of columns in a record (the count is a single byte).
pub const MAX_COLUMNS: usize = u8::MAX as usize;

/// A single column value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    /// Milliseconds since the Unix epoch, at midnight UTC.
    Date(i64),
    Text(String),
}

impl Value {
    /// The non-null kind of this value, or `None` for `Null`.
    #[must_use]
    pub const fn data_type(&self) -> Option<DataType> {
        Some(match self {
            Self::Null => return None,
            Self::TinyInt(_) => DataType::TinyInt,
            Self::SmallInt(_) => DataType::SmallInt,
            Self::Int(_) => DataType::Int,
            Self::BigInt(_) => DataType::BigInt,
            Self::Real(_) => DataType::Real,
            Self::Double(_) => DataType::Double,
            Self::DateTime(_) => DataType::DateTime,
            Self::Date(_) => DataType::Date,
            Self::Text(_) => DataType::Text,
        })
    }

    /// Parse a value of the given kind from its printable form.
    ///
    /// Placeholder kinds accept `NULL` in any case.
    pub fn parse(data_type: DataType, text: &str) -> Result<Self, RecordError> {
        let invalid = || RecordError::InvalidValue {
            data_type,
            text: text.to_string(),
        };

        let value = match data_type {
            DataType::Null1 | DataType::Null2 | DataType::Null4 | DataType::Null8 => {
                if text.eq_ignore_ascii_case("null") {
                    Self::Null
                } else {
                    return Err(invalid());
                }
            }
            DataType::TinyInt => Self::TinyInt(text.parse().map_err(|_| invalid())?),
            DataType::SmallInt => Self::SmallInt(text.parse().map_err(|_| invalid())?),
            DataType::Int => Self::Int(text.parse().map_err(|_| invalid())?),
            DataType::BigInt => Self::BigInt(text.parse().map_err(|_| invalid())?),
            DataType::Real => Self::Real(text.parse().map_err(|_| invalid())?),
            DataType::Double => Self::Double(text.parse().map_err(|_| invalid())?),
            DataType::DateTime => Self::DateTime(text.parse().map_err(|_| invalid())?),
            DataType::Date => Self::Date(text.parse().map_err(|_| invalid())?),
            DataType::Text => Self::Text(text.to_string()),
        };
        Ok(value)
    }

    /// Number of payload bytes this value occupies when stored as `data_type`.
    fn payload_len(&self, data_type: DataType) -> usize {
        match self {
            Self::Text(s) => s.len(),
            _ => data_type.fixed_size(),
        }
    }

    fn encode_into(&self, data_type: DataType, buf: &mut Vec<u8>) {
        match self {
            Self::Null => buf.resize(buf.len() + data_type.fixed_size(), 0),
            Self::TinyInt(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::SmallInt(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::BigInt(v) | Self::DateTime(v) | Self::Date(v) => {
                buf.extend_from_slice(&v.to_be_bytes());
            }
            Self::Real(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::Double(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Self::Text(s) => buf.extend_from_slice(s.as_bytes()),
        }
    }
}

// Floats compare by bit pattern so that decode(encode(x)) == x holds for
// every stored value, NaN included.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::TinyInt(a), Self::TinyInt(b)) => a == b,
            (Self::SmallInt(a), Self::SmallInt(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b))
            | (Self::DateTime(a), Self::DateTime(b))
            | (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::TinyInt(v) => write!(f, "{v}"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) | Self::DateTime(v) | Self::Date(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One row: a type per column and the matching value.
///
/// # Invariants
/// - `types.len() == values.len()`, at most `MAX_COLUMNS`
/// - a placeholder type always holds `Value::Null`
/// - any other type holds a value of exactly that kind
/// - text values are at most `MAX_TEXT_LENGTH` bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRecord {
    types: Vec<DataType>,
    values: Vec<Value>,
}

impl DataRecord {
    /// Build a record, checking that every value matches its type.
    pub fn new(types: Vec<DataType>, values: Vec<Value>) -> Result<Self, RecordError> {
        if types.len() != values.len() {
            return Err(RecordError::ArityMismatch {
                types: types.len(),
                values: values.len(),
            });
        }
        if types.len() > MAX_COLUMNS {
            return Err(RecordError::TooManyColumns(types.len()));
        }
        for (column, (data_type, value)) in types.iter().zip(&values).enumerate() {
            check_value(column, *data_type, value)?;
        }
        Ok(Self { types, values })
    }

    /// Build a record from printable values.
    pub fn parse(types: Vec<DataType>, texts: &[&str]) -> Result<Self, RecordError> {
        if types.len() != texts.len() {
            return Err(RecordError::ArityMismatch {
                types: types.len(),
                values: texts.len(),
            });
        }
        let values = types
            .iter()
            .zip(texts)
            .map(|(data_type, text)| Value::parse(*data_type, text))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(types, values)
    }

    /// Build a record for a table schema.
    ///
    /// `Value::Null` in a fixed-width column is stored under the column's
    /// placeholder type; in a text column it is stored as empty text.
    pub fn for_schema(schema: &[DataType], values: Vec<Value>) -> Result<Self, RecordError> {
        if schema.len() != values.len() {
            return Err(RecordError::ArityMismatch {
                types: schema.len(),
                values: values.len(),
            });
        }
        let mut types = Vec::with_capacity(schema.len());
        let mut resolved = Vec::with_capacity(values.len());
        for (declared, value) in schema.iter().zip(values) {
            match (value, declared.null_placeholder()) {
                (Value::Null, Some(placeholder)) => {
                    types.push(placeholder);
                    resolved.push(Value::Null);
                }
                (Value::Null, None) => {
                    types.push(*declared);
                    resolved.push(Value::Text(String::new()));
                }
                (value, _) => {
                    types.push(*declared);
                    resolved.push(value);
                }
            }
        }
        Self::new(types, resolved)
    }

    /// Column types, in column order. Text columns report plain `Text`.
    #[must_use]
    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Printable form of every value.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.values.iter().map(ToString::to_string).collect()
    }

    /// Replace one column's value.
    ///
    /// Setting a value on a placeholder column switches it to the non-null
    /// kind of the same width; setting `Null` switches back to the
    /// placeholder. A non-null column only accepts its own kind.
    pub fn set_value(&mut self, column: usize, value: Value) -> Result<(), RecordError> {
        let current = *self
            .types
            .get(column)
            .ok_or(RecordError::ColumnOutOfRange {
                column,
                columns: self.types.len(),
            })?;

        let (data_type, value) = match value.data_type() {
            None => match current.null_placeholder() {
                Some(placeholder) => (placeholder, Value::Null),
                None => (current, Value::Text(String::new())),
            },
            Some(kind) => {
                let accepted = if current.is_null() {
                    kind.null_placeholder() == Some(current)
                } else {
                    kind == current
                };
                if !accepted {
                    return Err(RecordError::TypeMismatch {
                        column,
                        data_type: current,
                    });
                }
                (kind, value)
            }
        };

        check_value(column, data_type, &value)?;
        self.types[column] = data_type;
        self.values[column] = value;
        Ok(())
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.types.len()
            + self
                .types
                .iter()
                .zip(&self.values)
                .map(|(data_type, value)| value.payload_len(*data_type))
                .sum::<usize>()
    }

    /// Serialize the record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the serialized record to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.types.len() as u8);
        for (data_type, value) in self.types.iter().zip(&self.values) {
            buf.push(data_type.serial_code(value.payload_len(*data_type)));
        }
        for (data_type, value) in self.types.iter().zip(&self.values) {
            value.encode_into(*data_type, buf);
        }
    }

    /// Deserialize a record. The whole slice must be consumed.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        let mut reader = Reader { bytes, pos: 0 };

        let count = usize::from(reader.array::<1>()?[0]);
        let header = reader.take(count)?;
        let mut types = Vec::with_capacity(count);
        let mut lengths = Vec::with_capacity(count);
        for &code in header {
            let (data_type, len) = DataType::from_code(code);
            types.push(data_type);
            lengths.push(len);
        }

        let mut values = Vec::with_capacity(count);
        for (column, (data_type, len)) in types.iter().zip(lengths).enumerate() {
            let value = match data_type {
                DataType::Null1 | DataType::Null2 | DataType::Null4 | DataType::Null8 => {
                    reader.take(len)?;
                    Value::Null
                }
                DataType::TinyInt => Value::TinyInt(i8::from_be_bytes(reader.array()?)),
                DataType::SmallInt => Value::SmallInt(i16::from_be_bytes(reader.array()?)),
                DataType::Int => Value::Int(i32::from_be_bytes(reader.array()?)),
                DataType::BigInt => Value::BigInt(i64::from_be_bytes(reader.array()?)),
                DataType::Real => Value::Real(f32::from_be_bytes(reader.array()?)),
                DataType::Double => Value::Double(f64::from_be_bytes(reader.array()?)),
                DataType::DateTime => Value::DateTime(i64::from_be_bytes(reader.array()?)),
                DataType::Date => Value::Date(i64::from_be_bytes(reader.array()?)),
                DataType::Text => {
                    let raw = reader.take(len)?;
                    let text = std::str::from_utf8(raw)
                        .map_err(|_| RecordError::InvalidUtf8 { column })?;
                    Value::Text(text.to_string())
                }
            };
            values.push(value);
        }

        if reader.pos != bytes.len() {
            return Err(RecordError::TrailingBytes {
                expected: reader.pos,
                actual: bytes.len(),
            });
        }

        Ok(Self { types, values })
    }
}

fn check_value(column: usize, data_type: DataType, value: &Value) -> Result<(), RecordError> {
    let matches = match (data_type, value) {
        (DataType::Text, Value::Text(s)) => {
            if s.len() > MAX_TEXT_LENGTH {
                return Err(RecordError::TextTooLong {
                    column,
                    len: s.len(),
                });
            }
            true
        }
        (placeholder, Value::Null) => placeholder.is_null(),
        (declared, value) => value.data_type() == Some(declared),
    };
    if matches {
        Ok(())
    } else {
        Err(RecordError::TypeMismatch { column, data_type })
    }
}

/// Bounds-checked cursor over an encoded record.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], RecordError> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(RecordError::Truncated {
                needed: end,
                available: self.bytes.len(),
            });
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], RecordError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// Errors produced while building or decoding a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The payload ended before the record did.
    Truncated { needed: usize, available: usize },
    /// The payload is longer than the record it encodes.
    TrailingBytes { expected: usize, actual: usize },
    /// Different number of types and values.
    ArityMismatch { types: usize, values: usize },
    /// More columns than the count byte can express.
    TooManyColumns(usize),
    /// A value does not match the type of its column.
    TypeMismatch { column: usize, data_type: DataType },
    /// Printable value could not be parsed for its type.
    InvalidValue { data_type: DataType, text: String },
    /// Text value longer than `MAX_TEXT_LENGTH`.
    TextTooLong { column: usize, len: usize },
    /// Stored text is not valid UTF-8.
    InvalidUtf8 { column: usize },
    /// Column index past the end of the record.
    ColumnOutOfRange { column: usize, columns: usize },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "record truncated: need {needed} bytes, have {available}")
            }
            Self::TrailingBytes { expected, actual } => {
                write!(f, "record is {expected} bytes but payload is {actual}")
            }
            Self::ArityMismatch { types, values } => {
                write!(f, "{types} column types but {values} values")
            }
            Self::TooManyColumns(n) => write!(f, "{n} columns (max {MAX_COLUMNS})"),
            Self::TypeMismatch { column, data_type } => {
                write!(f, "column {column}: value does not match type {data_type}")
            }
            Self::InvalidValue { data_type, text } => {
                write!(f, "'{text}' is not a valid {data_type} value")
            }
            Self::TextTooLong { column, len } => {
                write!(
                    f,
                    "column {column}: text of {len} bytes (max {MAX_TEXT_LENGTH})"
                )
            }
            Self::InvalidUtf8 { column } => write!(f, "column {column}: text is not UTF-8"),
            Self::ColumnOutOfRange { column, columns } => {
                write!(f, "column {column} out of range ({columns} columns)")
            }
        }
    }
}

impl std::error::Error for RecordError {}
