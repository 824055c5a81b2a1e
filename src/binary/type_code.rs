use crate::binary::constants::v1_0::length_codes;
use crate::types::IonType;

/// Represents the type information found in the high nibble of each binary Ion value's type
/// descriptor byte. While this value can be readily mapped from a user-level [`IonType`], it is
/// a distinct concept: integers are split by sign, and annotation wrappers have their own code.
///
/// See the
/// [Typed Value Formats](https://amazon-ion.github.io/ion-docs/docs/binary.html#typed-value-formats)
/// section of the Ion binary encoding documentation for more information.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum IonTypeCode {
    NullOrNop,       // 0
    Boolean,         // 1
    PositiveInteger, // 2
    NegativeInteger, // 3
    Float,           // 4
    Decimal,         // 5
    Timestamp,       // 6
    Symbol,          // 7
    String,          // 8
    Clob,            // 9
    Blob,            // 10
    List,            // 11
    SExpression,     // 12
    Struct,          // 13
    AnnotationOrIvm, // 14
}

impl From<IonType> for IonTypeCode {
    /// Maps a user-level type to the type code used to encode it. Integers map to the positive
    /// code; callers writing a negative integer pick [`IonTypeCode::NegativeInteger`] directly.
    fn from(ion_type: IonType) -> Self {
        use IonTypeCode::*;
        match ion_type {
            IonType::Null => NullOrNop,
            IonType::Bool => Boolean,
            IonType::Int => PositiveInteger,
            IonType::Float => Float,
            IonType::Decimal => Decimal,
            IonType::Timestamp => Timestamp,
            IonType::Symbol => Symbol,
            IonType::String => String,
            IonType::Clob => Clob,
            IonType::Blob => Blob,
            IonType::List => List,
            IonType::SExp => SExpression,
            IonType::Struct => Struct,
        }
    }
}

impl IonTypeCode {
    /// Constant function to convert an [`IonTypeCode`] into a `u8`.
    pub const fn to_u8(self) -> u8 {
        use IonTypeCode::*;
        match self {
            NullOrNop => 0,
            Boolean => 1,
            PositiveInteger => 2,
            NegativeInteger => 3,
            Float => 4,
            Decimal => 5,
            Timestamp => 6,
            Symbol => 7,
            String => 8,
            Clob => 9,
            Blob => 10,
            List => 11,
            SExpression => 12,
            Struct => 13,
            AnnotationOrIvm => 14,
        }
    }

    /// The type descriptor byte with this type code and the given `L` nibble.
    #[inline]
    pub const fn type_descriptor(self, length_code: u8) -> u8 {
        (self.to_u8() << 4) | (length_code & 0x0F)
    }

    /// The type descriptor byte for a typed null of this type code.
    #[inline]
    pub const fn null_type_descriptor(self) -> u8 {
        self.type_descriptor(length_codes::NULL)
    }
}
