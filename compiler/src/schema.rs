// schema.rs — Interface schema builder
//
// Resolves the requested input/output frame ids against the catalog and lays
// out the block's records: one field per signal (canonical name, resolved
// storage type) in message-then-signal order, the shared timeout flag, and
// the fixed config and internal records.
//
// Preconditions: `spec` came from validated command-line input.
// Postconditions: no record holds two fields with the same name; the outputs
//   record holds at most one timeout field, and only if it holds at least
//   one signal field.
// Failure modes: unresolved ids (W0101, skipped); name collisions (E0201);
//   block name, nickname or field name not a C identifier (E0202).
// Side effects: none.

use std::collections::HashMap;

use serde::Serialize;

use crate::canon::{canonicalize, is_c_identifier, is_c_keyword};
use crate::catalog::{Catalog, MessageDescriptor};
use crate::diag::{codes, Diagnostic};
use crate::idlist::IdListKind;
use crate::interface::InterfaceSpec;
use crate::model::{
    ConfigRecord, Field, FieldSource, InternalRecord, Record, TIMEOUT_FIELD, TIMEOUT_TYPE,
};
use crate::signal_type::resolve_storage_type;

// ── Public types ────────────────────────────────────────────────────────────

/// A catalog message the block uses, with its signals bound to record fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMessage {
    pub message: MessageDescriptor,
    /// Canonical message name, as used by the database codec symbols.
    pub c_name: String,
    pub bindings: Vec<SignalBinding>,
}

/// One signal of a resolved message and the record field it maps to. The
/// field name is also the signal's member name in the codec struct.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalBinding {
    pub signal_index: usize,
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct BlockSchema {
    pub block_name: String,
    pub nickname: String,
    pub inputs: Record,
    pub outputs: Record,
    pub config: ConfigRecord,
    pub internal: InternalRecord,
    /// Resolved input messages, in id-list order.
    pub input_messages: Vec<ResolvedMessage>,
    /// Resolved output messages, in id-list order.
    pub output_messages: Vec<ResolvedMessage>,
}

#[derive(Debug)]
pub struct SchemaResult {
    pub schema: BlockSchema,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn build_schema(spec: &InterfaceSpec, catalog: &Catalog) -> SchemaResult {
    let mut diagnostics = Vec::new();

    check_identifier("block name", &spec.block_name, &mut diagnostics);
    check_identifier("nickname", &spec.nickname, &mut diagnostics);

    let mut inputs = RecordBuilder::new(IdListKind::Input);
    let input_messages = resolve_all(
        &spec.input_ids,
        IdListKind::Input,
        catalog,
        &mut inputs,
        &mut diagnostics,
    );

    let mut outputs = RecordBuilder::new(IdListKind::Output);
    let output_messages = resolve_all(
        &spec.output_ids,
        IdListKind::Output,
        catalog,
        &mut outputs,
        &mut diagnostics,
    );
    if !outputs.record.is_empty() {
        outputs.record.fields.push(Field {
            name: TIMEOUT_FIELD.to_string(),
            ty: TIMEOUT_TYPE,
            source: FieldSource::Timeout,
        });
    }

    SchemaResult {
        schema: BlockSchema {
            block_name: spec.block_name.clone(),
            nickname: spec.nickname.clone(),
            inputs: inputs.record,
            outputs: outputs.record,
            config: ConfigRecord::new(spec.ticks_per_s),
            internal: InternalRecord::default(),
            input_messages,
            output_messages,
        },
        diagnostics,
    }
}

fn check_identifier(what: &str, value: &str, diagnostics: &mut Vec<Diagnostic>) {
    if !is_c_identifier(value) {
        diagnostics.push(
            Diagnostic::error(format!("{} '{}' is not a valid C identifier", what, value))
                .with_code(codes::E0202)
                .with_hint("use letters, digits and '_' only, not starting with a digit or spelling a C keyword"),
        );
    }
}

fn resolve_all(
    ids: &[u32],
    kind: IdListKind,
    catalog: &Catalog,
    record: &mut RecordBuilder,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ResolvedMessage> {
    let mut resolved = Vec::new();
    for &id in ids {
        let Some(msg) = catalog.lookup(id) else {
            diagnostics.push(
                Diagnostic::warning(format!("{} frame id 0x{:X} not found in catalog", kind, id))
                    .with_code(codes::W0101),
            );
            continue;
        };
        resolved.push(record.add_message(msg, diagnostics));
    }
    resolved
}

// ── Record construction ─────────────────────────────────────────────────────

/// Accumulates one record's fields and remembers which signal claimed each
/// canonical name.
struct RecordBuilder {
    kind: IdListKind,
    record: Record,
    claimed: HashMap<String, String>,
}

impl RecordBuilder {
    fn new(kind: IdListKind) -> Self {
        RecordBuilder {
            kind,
            record: Record::default(),
            claimed: HashMap::new(),
        }
    }

    fn add_message(
        &mut self,
        msg: &MessageDescriptor,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ResolvedMessage {
        let mut bindings = Vec::with_capacity(msg.signals.len());
        for (signal_index, sig) in msg.signals.iter().enumerate() {
            let name = canonicalize(&sig.name);
            let origin = format!("{}.{}", msg.name, sig.name);

            if self.kind == IdListKind::Output && name == TIMEOUT_FIELD {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "signal {} maps to field `{}`, which is reserved for the watchdog flag",
                        origin, name
                    ))
                    .with_code(codes::E0201),
                );
                continue;
            }
            if is_c_keyword(&name) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "signal {} maps to field `{}`, which is a C keyword",
                        origin, name
                    ))
                    .with_code(codes::E0202)
                    .with_hint("rename the signal in the database"),
                );
                continue;
            }
            if let Some(first) = self.claimed.get(&name) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "{} field `{}` from signal {} collides with signal {}",
                        self.kind, name, origin, first
                    ))
                    .with_code(codes::E0201)
                    .with_hint("rename one of the signals in the database"),
                );
                continue;
            }

            self.claimed.insert(name.clone(), origin);
            self.record.fields.push(Field {
                name: name.clone(),
                ty: resolve_storage_type(sig.scale, sig.is_signed, sig.bit_length),
                source: FieldSource::Signal {
                    frame_id: msg.frame_id,
                    message: msg.name.clone(),
                    signal: sig.name.clone(),
                },
            });
            bindings.push(SignalBinding {
                signal_index,
                field: name,
            });
        }

        ResolvedMessage {
            message: msg.clone(),
            c_name: canonicalize(&msg.name),
            bindings,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
