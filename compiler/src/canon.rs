// canon.rs — Identifier canonicalization
//
// Turns arbitrary catalog names (`EngineSpeed`, `HVBattery.Voltage`) into
// lowercase, underscore-separated C identifiers (`engine_speed`,
// `hv_battery_voltage`).
//
// Preconditions: none.
// Postconditions: output contains only `[a-z0-9_]`, never two `_` in a row,
//   and is non-empty when the input is non-empty.
// Failure modes: none. Distinct inputs may map to the same output; callers
//   that need uniqueness must check for collisions themselves.
// Side effects: none.

const SEP: char = '_';

/// Canonicalize `name` into a snake_case identifier.
///
/// Steps, in order:
/// 1. insert `_` before every capitalized run (`Xxx`) that follows another
///    character, so `EngineSpeed` becomes `Engine_Speed`;
/// 2. collapse repeated `_`;
/// 3. insert `_` between a lowercase letter or digit and a following capital;
/// 4. lowercase;
/// 5. replace every character outside `[a-z0-9]` with `_`, collapsing again.
pub fn canonicalize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let split = split_capitalized_runs(&chars);
    let collapsed = collapse_separators(split);
    let split = split_lower_upper(&collapsed);
    let lowered: String = split.into_iter().collect::<String>().to_lowercase();
    let replaced: Vec<char> = lowered
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { SEP })
        .collect();
    collapse_separators(replaced).into_iter().collect()
}

/// `(.)([A-Z][a-z]+)` → `\1_\2`, scanning left to right without overlap.
fn split_capitalized_runs(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run_start = i + 1;
        let starts_run = c != '\n'
            && run_start + 1 < chars.len()
            && chars[run_start].is_ascii_uppercase()
            && chars[run_start + 1].is_ascii_lowercase();
        if starts_run {
            out.push(c);
            out.push(SEP);
            out.push(chars[run_start]);
            let mut j = run_start + 1;
            while j < chars.len() && chars[j].is_ascii_lowercase() {
                out.push(chars[j]);
                j += 1;
            }
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

/// `([a-z0-9])([A-Z])` → `\1_\2`, scanning left to right without overlap.
fn split_lower_upper(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let boundary = (c.is_ascii_lowercase() || c.is_ascii_digit())
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_uppercase());
        if boundary {
            out.push(c);
            out.push(SEP);
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

fn collapse_separators(chars: Vec<char>) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    for c in chars {
        if c == SEP && out.last() == Some(&SEP) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Reserved words of C99 and C11.
const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "_Alignas", "_Alignof", "_Atomic", "_Bool",
    "_Complex", "_Generic", "_Imaginary", "_Noreturn", "_Static_assert", "_Thread_local",
];

pub fn is_c_keyword(s: &str) -> bool {
    C_KEYWORDS.contains(&s)
}

/// True if `s` is usable as a C identifier: `[A-Za-z_][A-Za-z0-9_]*` and
/// not a keyword.
pub fn is_c_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_c_keyword(s)
}
