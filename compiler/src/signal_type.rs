// signal_type.rs — Storage type resolution for CAN signals
//
// Maps a signal's (scale, signedness, bit width) triple to the C storage type
// used for its field in the generated block records.
//
// Preconditions: none.
// Postconditions: every input maps to exactly one StorageType.
// Failure modes: none (widths above 32 bits fall back to float).
// Side effects: none.

use std::fmt;

use serde::Serialize;

/// C storage type of a generated record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Uint8,
    Uint16,
    Uint32,
    Int8,
    Int16,
    Int32,
    Float,
}

impl StorageType {
    /// C spelling of the type.
    pub fn c_name(self) -> &'static str {
        match self {
            StorageType::Uint8 => "uint8_t",
            StorageType::Uint16 => "uint16_t",
            StorageType::Uint32 => "uint32_t",
            StorageType::Int8 => "int8_t",
            StorageType::Int16 => "int16_t",
            StorageType::Int32 => "int32_t",
            StorageType::Float => "float",
        }
    }

    /// Bit width and signedness of an integer type; `None` for float.
    pub fn int_layout(self) -> Option<(u32, bool)> {
        match self {
            StorageType::Uint8 => Some((8, false)),
            StorageType::Uint16 => Some((16, false)),
            StorageType::Uint32 => Some((32, false)),
            StorageType::Int8 => Some((8, true)),
            StorageType::Int16 => Some((16, true)),
            StorageType::Int32 => Some((32, true)),
            StorageType::Float => None,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Pick the storage type for a signal.
///
/// Any scale other than exactly 1 yields `float`. Otherwise the narrowest
/// 8/16/32-bit integer of matching signedness that holds `bit_length` bits;
/// wider unscaled signals fall through to `float`.
pub fn resolve_storage_type(scale: f64, is_signed: bool, bit_length: u32) -> StorageType {
    if scale != 1.0 {
        return StorageType::Float;
    }
    match (is_signed, bit_length) {
        (true, 0..=8) => StorageType::Int8,
        (true, 9..=16) => StorageType::Int16,
        (true, 17..=32) => StorageType::Int32,
        (false, 0..=8) => StorageType::Uint8,
        (false, 9..=16) => StorageType::Uint16,
        (false, 17..=32) => StorageType::Uint32,
        _ => StorageType::Float,
    }
}
