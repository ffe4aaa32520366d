// catalog.rs — CAN message/signal catalog
//
// Loads a DBC database and answers frame-id lookups with message and signal
// metadata. This is the only place the compiler reads the database; every
// later phase works from the descriptors returned here.
//
// Preconditions: none. Files may be UTF-8 (with or without BOM) or
// Windows-1252, the encoding DBC editors commonly export.
// Postconditions: every loaded message has a unique frame id.
// Failure modes: unreadable file, unparsable text, duplicate frame id.
// Side effects: file read in `load_dbc`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

// ── Data types ──────────────────────────────────────────────────────────────

/// Bit numbering of a signal within the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Intel (`@1`): start bit is the LSB, bits grow upward.
    LittleEndian,
    /// Motorola (`@0`): start bit is the MSB, sawtooth numbering.
    BigEndian,
}

/// One signal of a message, as defined in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalDescriptor {
    pub name: String,
    pub start_bit: u32,
    pub bit_length: u32,
    pub byte_order: ByteOrder,
    pub is_signed: bool,
    pub scale: f64,
    pub offset: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub unit: String,
}

impl SignalDescriptor {
    /// True if raw and physical values differ, i.e. the signal needs its
    /// encode/decode transform rather than a plain copy.
    pub fn has_transform(&self) -> bool {
        self.scale != 1.0 || self.offset != 0.0
    }
}

/// One message (frame) of the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDescriptor {
    /// Frame identifier with the extended-frame marker bit removed.
    pub frame_id: u32,
    pub is_extended: bool,
    pub name: String,
    /// Payload length in bytes.
    pub length: u8,
    pub sender: String,
    pub signals: Vec<SignalDescriptor>,
}

/// Bit 31 of a DBC message id marks an extended (29-bit) frame.
pub const EXTENDED_FLAG: u32 = 0x8000_0000;
pub const FRAME_ID_MASK: u32 = 0x1FFF_FFFF;

/// Pseudo-message DBC editors use to park unassigned signals.
pub const INDEPENDENT_SIGNALS_MESSAGE: &str = "VECTOR__INDEPENDENT_SIG_MSG";

// ── Errors ──────────────────────────────────────────────────────────────────

/// Errors that can occur during catalog loading.
#[derive(Debug)]
pub enum CatalogError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        origin: String,
        line: usize,
        message: String,
    },
    DuplicateFrameId {
        frame_id: u32,
        first: String,
        second: String,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io { path, source } => {
                write!(f, "failed to open database {}: {}", path.display(), source)
            }
            CatalogError::Parse {
                origin,
                line,
                message,
            } => write!(f, "{}:{}: {}", origin, line, message),
            CatalogError::DuplicateFrameId {
                frame_id,
                first,
                second,
            } => write!(
                f,
                "duplicate frame id 0x{:X}: used by '{}' and '{}'",
                frame_id, first, second
            ),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── Catalog ─────────────────────────────────────────────────────────────────

/// Message catalog keyed by frame id. Iteration follows database order.
#[derive(Debug, Default)]
pub struct Catalog {
    messages: Vec<MessageDescriptor>,
    by_frame_id: HashMap<u32, usize>,
}

impl Catalog {
    /// An empty catalog: every lookup is unresolved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse a DBC file.
    pub fn load_dbc(path: &Path) -> Result<Self, CatalogError> {
        let bytes = std::fs::read(path).map_err(|e| CatalogError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_source(&decode_dbc(&bytes), &path.display().to_string())
    }

    /// Parse DBC text. `origin` names the text in error messages.
    pub fn from_source(source: &str, origin: &str) -> Result<Self, CatalogError> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let result = crate::dbc_parser::parse(source);
        if let Some(err) = result.errors.first() {
            return Err(CatalogError::Parse {
                origin: origin.to_string(),
                line: line_of(source, err.span().start),
                message: err.to_string(),
            });
        }
        Self::from_messages(result.messages)
    }

    /// Build a catalog from already-parsed messages.
    pub fn from_messages(messages: Vec<MessageDescriptor>) -> Result<Self, CatalogError> {
        let mut catalog = Catalog::new();
        for msg in messages {
            if msg.name == INDEPENDENT_SIGNALS_MESSAGE {
                continue;
            }
            if let Some(&idx) = catalog.by_frame_id.get(&msg.frame_id) {
                return Err(CatalogError::DuplicateFrameId {
                    frame_id: msg.frame_id,
                    first: catalog.messages[idx].name.clone(),
                    second: msg.name,
                });
            }
            catalog
                .by_frame_id
                .insert(msg.frame_id, catalog.messages.len());
            catalog.messages.push(msg);
        }
        Ok(catalog)
    }

    /// Resolve a frame id. `None` means the id is not in the database.
    pub fn lookup(&self, frame_id: u32) -> Option<&MessageDescriptor> {
        self.by_frame_id.get(&frame_id).map(|&i| &self.messages[i])
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageDescriptor> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Compact JSON of every message in database order. Stable across runs,
    /// so it can be hashed into a fingerprint.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(&self.messages).unwrap_or_default()
    }
}

/// Decode raw database bytes. A UTF-8 BOM is dropped; bytes that are not
/// valid UTF-8 are read as Windows-1252.
pub fn decode_dbc(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

fn line_of(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

// ── Tests ───────────────────────────────────────────────────────────────────
