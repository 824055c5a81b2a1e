/// Constants for Ion v1.0
pub mod v1_0 {
    /// Ion Version Marker byte sequence
    pub const IVM: [u8; 4] = [0xE0, 0x01, 0x00, 0xEA];

    /// Constants for interpreting the length (`L`) code of binary values
    pub mod length_codes {
        pub const NULL: u8 = 15;
        pub const VAR_UINT: u8 = 14;
    }

    /// The largest length that fits in the `L` nibble of a type descriptor. Longer values are
    /// followed by a VarUInt length.
    pub const MAX_INLINE_LENGTH: usize = 13;

    /// The largest number of bytes an annotation wrapper's annotation list may occupy; its length
    /// is always written as a single-byte VarUInt.
    pub const MAX_ANNOTATIONS_LENGTH: usize = 0x7F;

    /// Type descriptors that carry their full meaning in a single byte.
    pub mod type_descriptors {
        pub const BOOL_FALSE: u8 = 0x10;
        pub const BOOL_TRUE: u8 = 0x11;
        pub const INT_ZERO: u8 = 0x20;
        pub const FLOAT_32: u8 = 0x44;
        pub const FLOAT_64: u8 = 0x48;
        pub const DECIMAL_POSITIVE_ZERO: u8 = 0x50;
        /// The offset byte of a timestamp whose UTC offset is unknown (`-00:00`).
        pub const TIMESTAMP_UNKNOWN_OFFSET: u8 = 0xC0;
    }
}
