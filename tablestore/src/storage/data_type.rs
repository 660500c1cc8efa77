//! Column value kinds and their on-disk type codes.
//!
//! Every column of a record is tagged with a one-byte type code. Fixed-width
//! kinds have a single code; `Text` uses every code from [`TEXT_BASE`] upward,
//! with the text's byte length added to the base.

/// Type code of an empty text value. Any code at or above this denotes text
/// of length `code - TEXT_BASE`.
pub const TEXT_BASE: u8 = 0x0C;

/// Longest text value (in bytes) that fits in a type code.
pub const MAX_TEXT_LENGTH: usize = (u8::MAX - TEXT_BASE) as usize;

/// The kind of value stored in a column.
///
/// `Null1`..`Null8` are placeholders for a null value in a nullable
/// fixed-width column. They keep the column's width so the record layout does
/// not change when the value is set or cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Null1 = 0x00,
    Null2 = 0x01,
    Null4 = 0x02,
    Null8 = 0x03,
    TinyInt = 0x04,
    SmallInt = 0x05,
    Int = 0x06,
    BigInt = 0x07,
    Real = 0x08,
    Double = 0x09,
    DateTime = 0x0A,
    Date = 0x0B,
    Text = TEXT_BASE,
}

impl DataType {
    /// Every kind, in type-code order.
    pub const ALL: [Self; 13] = [
        Self::Null1,
        Self::Null2,
        Self::Null4,
        Self::Null8,
        Self::TinyInt,
        Self::SmallInt,
        Self::Int,
        Self::BigInt,
        Self::Real,
        Self::Double,
        Self::DateTime,
        Self::Date,
        Self::Text,
    ];

    /// The base type code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Resolve a serialized type code. Text codes carry a length, which is
    /// returned alongside the kind.
    ///
    /// Every byte is a valid code: the fixed kinds occupy `0x00..TEXT_BASE`
    /// and the remaining codes are text lengths `0..=MAX_TEXT_LENGTH`.
    #[must_use]
    pub const fn from_code(code: u8) -> (Self, usize) {
        let data_type = match code {
            0x00 => Self::Null1,
            0x01 => Self::Null2,
            0x02 => Self::Null4,
            0x03 => Self::Null8,
            0x04 => Self::TinyInt,
            0x05 => Self::SmallInt,
            0x06 => Self::Int,
            0x07 => Self::BigInt,
            0x08 => Self::Real,
            0x09 => Self::Double,
            0x0A => Self::DateTime,
            0x0B => Self::Date,
            _ => return (Self::Text, (code - TEXT_BASE) as usize),
        };
        (data_type, data_type.fixed_size())
    }

    /// Type code written for a value of this kind whose payload is `len`
    /// bytes long. Only text codes depend on the length.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // callers bound len by MAX_TEXT_LENGTH
    pub const fn serial_code(self, len: usize) -> u8 {
        match self {
            Self::Text => TEXT_BASE + len as u8,
            _ => self.code(),
        }
    }

    /// Byte width of a fixed-width kind. Text reports 0 here.
    #[must_use]
    pub const fn fixed_size(self) -> usize {
        match self {
            Self::Null1 | Self::TinyInt => 1,
            Self::Null2 | Self::SmallInt => 2,
            Self::Null4 | Self::Int | Self::Real => 4,
            Self::Null8 | Self::BigInt | Self::Double | Self::DateTime | Self::Date => 8,
            Self::Text => 0,
        }
    }

    /// Largest payload a value of this kind can occupy.
    #[must_use]
    pub const fn max_size(self) -> usize {
        match self {
            Self::Text => MAX_TEXT_LENGTH,
            _ => self.fixed_size(),
        }
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        matches!(self, Self::Null1 | Self::Null2 | Self::Null4 | Self::Null8)
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text)
    }

    /// The placeholder a column of this kind switches to when its value is
    /// cleared. Text has none: an empty text value is stored instead.
    #[must_use]
    pub const fn null_placeholder(self) -> Option<Self> {
        match self {
            Self::Text => None,
            Self::Null1 | Self::TinyInt => Some(Self::Null1),
            Self::Null2 | Self::SmallInt => Some(Self::Null2),
            Self::Null4 | Self::Int | Self::Real => Some(Self::Null4),
            Self::Null8 | Self::BigInt | Self::Double | Self::DateTime | Self::Date => {
                Some(Self::Null8)
            }
        }
    }

    /// Whether a value tagged `self` may be stored in a column declared as
    /// `declared`: either the declared kind itself or its null placeholder.
    #[must_use]
    pub fn fits_column(self, declared: Self) -> bool {
        self == declared || (self.is_null() && declared.null_placeholder() == Some(self))
    }

    /// Lowercase name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null1 => "null1",
            Self::Null2 => "null2",
            Self::Null4 => "null4",
            Self::Null8 => "null8",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::Double => "double",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_contiguous() {
        for (i, data_type) in DataType::ALL.iter().enumerate() {
            assert_eq!(usize::from(data_type.code()), i);
        }
    }

    #[test]
    fn test_from_code_fixed() {
        assert_eq!(DataType::from_code(0x00), (DataType::Null1, 1));
        assert_eq!(DataType::from_code(0x03), (DataType::Null8, 8));
        assert_eq!(DataType::from_code(0x07), (DataType::BigInt, 8));
        assert_eq!(DataType::from_code(0x08), (DataType::Real, 4));
        assert_eq!(DataType::from_code(0x0B), (DataType::Date, 8));
    }

    #[test]
    fn test_text_codes_carry_length() {
        assert_eq!(DataType::from_code(0x0C), (DataType::Text, 0));
        assert_eq!(DataType::from_code(0x12), (DataType::Text, 6));
        assert_eq!(DataType::from_code(0xFF), (DataType::Text, MAX_TEXT_LENGTH));
        assert_eq!(DataType::Text.serial_code(6), 0x12);
        assert_eq!(DataType::Int.serial_code(6), 0x06);
    }

    #[test]
    fn test_null_placeholders() {
        assert_eq!(DataType::TinyInt.null_placeholder(), Some(DataType::Null1));
        assert_eq!(DataType::SmallInt.null_placeholder(), Some(DataType::Null2));
        assert_eq!(DataType::Real.null_placeholder(), Some(DataType::Null4));
        assert_eq!(DataType::DateTime.null_placeholder(), Some(DataType::Null8));
        assert_eq!(DataType::Text.null_placeholder(), None);

        for data_type in DataType::ALL {
            if let Some(placeholder) = data_type.null_placeholder() {
                assert_eq!(placeholder.fixed_size(), data_type.fixed_size());
            }
        }
    }

    #[test]
    fn test_fits_column() {
        assert!(DataType::Int.fits_column(DataType::Int));
        assert!(DataType::Null4.fits_column(DataType::Int));
        assert!(DataType::Null4.fits_column(DataType::Real));
        assert!(!DataType::Null8.fits_column(DataType::Int));
        assert!(!DataType::BigInt.fits_column(DataType::Int));
        assert!(!DataType::Null1.fits_column(DataType::Text));
    }
}
