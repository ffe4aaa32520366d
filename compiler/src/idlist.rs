// idlist.rs — Frame id list parsing
//
// Parses the comma-separated `-i` / `-o` arguments into frame ids. Each token
// is decimal or `0x`-prefixed hexadecimal.
//
// Preconditions: none.
// Postconditions: `IdList::Absent` iff the argument was missing or blank;
//   otherwise the ids in argument order, without repeats.
// Failure modes: malformed tokens (W0102) and repeats (W0103) are reported
//   and skipped; the remaining tokens are still parsed.
// Side effects: none.

use std::collections::HashSet;
use std::fmt;

use crate::diag::{codes, Diagnostic, Span};

/// Which list an argument populates; used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdListKind {
    Input,
    Output,
}

impl fmt::Display for IdListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdListKind::Input => write!(f, "input"),
            IdListKind::Output => write!(f, "output"),
        }
    }
}

/// A parsed id list. `Absent` and `Ids(vec![])` are different: the latter
/// means every token was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdList {
    Absent,
    Ids(Vec<u32>),
}

impl IdList {
    pub fn ids(&self) -> &[u32] {
        match self {
            IdList::Absent => &[],
            IdList::Ids(ids) => ids,
        }
    }

    pub fn into_ids(self) -> Vec<u32> {
        match self {
            IdList::Absent => Vec::new(),
            IdList::Ids(ids) => ids,
        }
    }
}

#[derive(Debug)]
pub struct IdListResult {
    pub list: IdList,
    pub diagnostics: Vec<Diagnostic>,
}

/// Why a single token was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdTokenError {
    Empty,
    Invalid,
    OutOfRange,
}

impl fmt::Display for IdTokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdTokenError::Empty => write!(f, "empty entry"),
            IdTokenError::Invalid => write!(f, "not a decimal or 0x-prefixed hexadecimal integer"),
            IdTokenError::OutOfRange => write!(f, "does not fit in 32 bits"),
        }
    }
}

/// Parse one token: `0x1A0` / `0X1a0` as hex, anything else as decimal.
pub fn parse_id_token(token: &str) -> Result<u32, IdTokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(IdTokenError::Empty);
    }
    let (digits, radix) = match token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (token, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(IdTokenError::Invalid);
    }
    u32::from_str_radix(digits, radix).map_err(|_| IdTokenError::OutOfRange)
}

/// Parse a whole `-i`/`-o` argument.
pub fn parse_id_list(arg: Option<&str>, kind: IdListKind) -> IdListResult {
    let mut diagnostics = Vec::new();
    let arg = match arg {
        Some(a) if !a.trim().is_empty() => a,
        _ => {
            return IdListResult {
                list: IdList::Absent,
                diagnostics,
            }
        }
    };

    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = 0usize;
    for token in arg.split(',') {
        let span: Span = (offset..offset + token.len()).into();
        offset += token.len() + 1;

        match parse_id_token(token) {
            Ok(id) => {
                if seen.insert(id) {
                    ids.push(id);
                } else {
                    diagnostics.push(
                        Diagnostic::warning(format!(
                            "{} frame id 0x{:X} listed more than once; later entry ignored",
                            kind, id
                        ))
                        .with_code(codes::W0103)
                        .with_span(span),
                    );
                }
            }
            Err(e) => diagnostics.push(
                Diagnostic::warning(format!(
                    "invalid {} frame id '{}': {}",
                    kind,
                    token.trim(),
                    e
                ))
                .with_code(codes::W0102)
                .with_span(span)
                .with_hint("ids are decimal (256) or hexadecimal with a 0x prefix (0x100)"),
            ),
        }
    }

    IdListResult {
        list: IdList::Ids(ids),
        diagnostics,
    }
}
