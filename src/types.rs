//! Value-type model for the intermediate representation.
//!
//! Every value node in a [`MethodGraph`](crate::ir::MethodGraph) carries one [`DataType`].
//! The set is closed: a reference kind, the signed and unsigned integers of 8, 16, 32
//! and 64 bits, boolean, the two floating point widths, and void.
//!
//! Bytecode registers are untyped, so the builder assigns provisional types at
//! definition sites (a `const` is an `Int32` even if it is later read as a float)
//! and reconciles them afterwards. The helpers in this module implement the
//! rules that reconciliation depends on:
//!
//! - [`DataType::to_phi_type`] normalizes sub-word integers to `Int32`, the
//!   narrowest type a register merge can have.
//! - [`DataType::is_implicit_conversion`] describes widenings that need no
//!   conversion node.
//! - [`DataType::from_shorty`] and [`DataType::from_descriptor`] map signature
//!   characters and type descriptors to value types.

use strum::{EnumCount, EnumIter, IntoStaticStr};

/// Runtime value kind of an IR value.
///
/// # Examples
///
/// ```rust,ignore
/// use ssagraph::DataType;
///
/// assert!(DataType::Int64.is_64bit());
/// assert_eq!(DataType::Int8.to_phi_type(), DataType::Int32);
/// assert_eq!(DataType::from_descriptor("[I"), DataType::Reference);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount, IntoStaticStr,
)]
pub enum DataType {
    /// Object or array reference, including null.
    #[strum(serialize = "ref")]
    Reference,
    /// Boolean, stored as a single byte.
    #[strum(serialize = "bool")]
    Bool,
    /// Unsigned 8-bit integer.
    #[strum(serialize = "u8")]
    Uint8,
    /// Signed 8-bit integer.
    #[strum(serialize = "i8")]
    Int8,
    /// Unsigned 16-bit integer (the bytecode `char`).
    #[strum(serialize = "u16")]
    Uint16,
    /// Signed 16-bit integer.
    #[strum(serialize = "i16")]
    Int16,
    /// Unsigned 32-bit integer.
    #[strum(serialize = "u32")]
    Uint32,
    /// Signed 32-bit integer.
    #[strum(serialize = "i32")]
    Int32,
    /// Unsigned 64-bit integer.
    #[strum(serialize = "u64")]
    Uint64,
    /// Signed 64-bit integer.
    #[strum(serialize = "i64")]
    Int64,
    /// 32-bit IEEE float.
    #[strum(serialize = "f32")]
    Float32,
    /// 64-bit IEEE float.
    #[strum(serialize = "f64")]
    Float64,
    /// No value.
    #[strum(serialize = "void")]
    Void,
}

impl DataType {
    /// Size of a value of this type in bytes. References are compressed to 4 bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Bool | Self::Uint8 | Self::Int8 => 1,
            Self::Uint16 | Self::Int16 => 2,
            Self::Reference | Self::Uint32 | Self::Int32 | Self::Float32 => 4,
            Self::Uint64 | Self::Int64 | Self::Float64 => 8,
        }
    }

    /// Returns `true` for types that occupy a register pair.
    #[must_use]
    pub const fn is_64bit(self) -> bool {
        matches!(self, Self::Uint64 | Self::Int64 | Self::Float64)
    }

    /// Returns `true` for boolean and integer types.
    #[must_use]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Uint8
                | Self::Int8
                | Self::Uint16
                | Self::Int16
                | Self::Uint32
                | Self::Int32
                | Self::Uint64
                | Self::Int64
        )
    }

    /// Returns `true` for the two types whose bytecode accessors are shared with floats.
    #[must_use]
    pub const fn is_int_or_long(self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    /// Returns `true` for `Float32` and `Float64`.
    #[must_use]
    pub const fn is_floating_point(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns `true` for the unsigned integer types.
    #[must_use]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64
        )
    }

    /// Returns `true` for [`DataType::Reference`].
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Reference)
    }

    /// The signed type a value of this type computes in.
    ///
    /// Sub-word and boolean values compute as `Int32`; unsigned types map to
    /// their signed counterpart of the same width.
    #[must_use]
    pub const fn kind(self) -> Self {
        match self {
            Self::Bool | Self::Uint8 | Self::Int8 | Self::Uint16 | Self::Int16 | Self::Uint32 => {
                Self::Int32
            }
            Self::Uint64 => Self::Int64,
            other => other,
        }
    }

    /// Normalizes a type for use as a phi type.
    ///
    /// Registers hold at least 32 bits, so a merge of sub-word values is an `Int32`.
    #[must_use]
    pub const fn to_phi_type(self) -> Self {
        match self {
            Self::Bool | Self::Uint8 | Self::Int8 | Self::Uint16 | Self::Int16 => Self::Int32,
            other => other,
        }
    }

    /// Returns `true` if a value of type `from` can be used as `to` without a conversion.
    ///
    /// Never true for a conversion to `Bool` or `Void`.
    #[must_use]
    pub const fn is_implicit_conversion(from: Self, to: Self) -> bool {
        if from as u8 == to as u8 {
            return true;
        }
        match to {
            Self::Int32 => matches!(
                from,
                Self::Bool | Self::Uint8 | Self::Int8 | Self::Uint16 | Self::Int16
            ),
            Self::Int16 => matches!(from, Self::Bool | Self::Uint8 | Self::Int8),
            Self::Uint16 => matches!(from, Self::Bool | Self::Uint8),
            Self::Int8 | Self::Uint8 => matches!(from, Self::Bool),
            _ => false,
        }
    }

    /// Maps a signature shorty character to a type.
    ///
    /// `L` and `[` both map to [`DataType::Reference`].
    #[must_use]
    pub const fn from_shorty(c: char) -> Option<Self> {
        Some(match c {
            'V' => Self::Void,
            'Z' => Self::Bool,
            'B' => Self::Int8,
            'C' => Self::Uint16,
            'S' => Self::Int16,
            'I' => Self::Int32,
            'J' => Self::Int64,
            'F' => Self::Float32,
            'D' => Self::Float64,
            'L' | '[' => Self::Reference,
            _ => return None,
        })
    }

    /// Shorty character of this type; `None` for unsigned types which have no
    /// bytecode spelling.
    #[must_use]
    pub const fn shorty(self) -> Option<char> {
        Some(match self {
            Self::Void => 'V',
            Self::Bool => 'Z',
            Self::Int8 => 'B',
            Self::Uint16 => 'C',
            Self::Int16 => 'S',
            Self::Int32 => 'I',
            Self::Int64 => 'J',
            Self::Float32 => 'F',
            Self::Float64 => 'D',
            Self::Reference => 'L',
            Self::Uint8 | Self::Uint32 | Self::Uint64 => return None,
        })
    }

    /// Maps a type descriptor (`I`, `Ljava/lang/String;`, `[J`, ...) to a type.
    ///
    /// Malformed descriptors map to `Void`; callers validate descriptors where it matters.
    #[must_use]
    pub fn from_descriptor(descriptor: &str) -> Self {
        descriptor
            .chars()
            .next()
            .and_then(Self::from_shorty)
            .unwrap_or(Self::Void)
    }

    /// Element type of an array descriptor (`[I` gives `Int32`), or `None` when
    /// the descriptor is not an array.
    #[must_use]
    pub fn array_component(descriptor: &str) -> Option<Self> {
        descriptor
            .strip_prefix('[')
            .map(Self::from_descriptor)
            .filter(|ty| *ty != Self::Void)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_phi_type_normalizes_subword() {
        for ty in [
            DataType::Bool,
            DataType::Int8,
            DataType::Uint8,
            DataType::Int16,
            DataType::Uint16,
        ] {
            assert_eq!(ty.to_phi_type(), DataType::Int32);
        }
        assert_eq!(DataType::Float32.to_phi_type(), DataType::Float32);
        assert_eq!(DataType::Reference.to_phi_type(), DataType::Reference);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::Int64.size(), 8);
        assert_eq!(DataType::Reference.size(), 4);
        assert_eq!(DataType::Void.size(), 0);
        for ty in DataType::iter() {
            assert_eq!(ty.is_64bit(), ty.size() == 8);
        }
    }

    #[test]
    fn test_implicit_conversions() {
        assert!(DataType::is_implicit_conversion(DataType::Int8, DataType::Int32));
        assert!(DataType::is_implicit_conversion(DataType::Bool, DataType::Int16));
        assert!(!DataType::is_implicit_conversion(DataType::Int32, DataType::Int8));
        assert!(!DataType::is_implicit_conversion(DataType::Int32, DataType::Int64));
        assert!(!DataType::is_implicit_conversion(DataType::Int32, DataType::Float32));
        for ty in DataType::iter() {
            assert!(DataType::is_implicit_conversion(ty, ty));
        }
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(DataType::from_descriptor("Z"), DataType::Bool);
        assert_eq!(DataType::from_descriptor("J"), DataType::Int64);
        assert_eq!(DataType::from_descriptor("Ljava/lang/Object;"), DataType::Reference);
        assert_eq!(DataType::from_descriptor(""), DataType::Void);
        assert_eq!(DataType::array_component("[I"), Some(DataType::Int32));
        assert_eq!(DataType::array_component("[[I"), Some(DataType::Reference));
        assert_eq!(DataType::array_component("I"), None);
    }

    #[test]
    fn test_shorty_roundtrip_for_signed_types() {
        for ty in DataType::iter().filter(|t| t.shorty().is_some()) {
            assert_eq!(DataType::from_shorty(ty.shorty().unwrap()), Some(ty));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::Int32.to_string(), "i32");
        assert_eq!(DataType::Reference.to_string(), "ref");
    }
}
