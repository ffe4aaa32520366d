// model.rs — Generated block model
//
// The immutable description of one block handed from the front half of the
// compiler (schema + behavior) to the emitter: its four records and the
// runtime behavior that operates on them. Built once per compilation by pure
// functions; never mutated afterwards.
//
// See `schema.rs` for how the records are populated and `behavior.rs` for
// the behavior.

use serde::Serialize;

use crate::behavior::BlockBehavior;
use crate::schema::BlockSchema;
use crate::signal_type::StorageType;

/// Name of the shared outputs-record flag set by the watchdog.
pub const TIMEOUT_FIELD: &str = "timeout";
/// Storage of the timeout flag (`uint8_t`, 0 or 1).
pub const TIMEOUT_TYPE: StorageType = StorageType::Uint8;

/// Config-record field holding the advance rate in ticks per second.
pub const TICK_RATE_FIELD: &str = "ticks_per_s";
/// Config-record field holding the host's transmit callback.
pub const TRANSMIT_FIELD: &str = "can_send";
/// Tick rate written by the generated initialize entry point.
pub const DEFAULT_TICKS_PER_S: u8 = 100;

/// Saturation ceiling of the watchdog counter.
pub const CAN_TICK_CEILING: u16 = 0xFFF0;

// ── Records ────────────────────────────────────────────────────────────────

/// Where a record field's value comes from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    /// One signal of a catalog message.
    Signal {
        frame_id: u32,
        message: String,
        signal: String,
    },
    /// The block-wide watchdog flag.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub ty: StorageType,
    pub source: FieldSource,
}

/// An ordered list of fields. Order is catalog order (message, then signal),
/// never alphabetical.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    pub fields: Vec<Field>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Fields that carry signal values (everything except the timeout flag).
    pub fn signal_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|f| matches!(f.source, FieldSource::Signal { .. }))
    }
}

/// Configuration record: the tick rate plus the host transmit capability.
/// Both are always present, even for a block with no CAN traffic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRecord {
    pub tick_rate_field: &'static str,
    pub tick_rate_type: StorageType,
    pub default_ticks_per_s: u8,
    pub transmit_field: &'static str,
}

impl ConfigRecord {
    pub fn new(default_ticks_per_s: u8) -> Self {
        ConfigRecord {
            tick_rate_field: TICK_RATE_FIELD,
            tick_rate_type: StorageType::Uint8,
            default_ticks_per_s,
            transmit_field: TRANSMIT_FIELD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CounterPolicy {
    /// Increments every advance; wraps at the storage width.
    Wrapping,
    /// Increments every advance until it reaches `ceiling`, then holds.
    Saturating { ceiling: u16 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counter {
    pub name: &'static str,
    pub ty: StorageType,
    pub policy: CounterPolicy,
}

/// Internal-state record: the scheduling counter and the watchdog counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalRecord {
    pub tick_counter: Counter,
    pub can_tick_counter: Counter,
}

impl Default for InternalRecord {
    fn default() -> Self {
        InternalRecord {
            tick_counter: Counter {
                name: "tick_counter",
                ty: StorageType::Uint16,
                policy: CounterPolicy::Wrapping,
            },
            can_tick_counter: Counter {
                name: "can_tick_counter",
                ty: StorageType::Uint16,
                policy: CounterPolicy::Saturating {
                    ceiling: CAN_TICK_CEILING,
                },
            },
        }
    }
}

impl InternalRecord {
    pub fn counters(&self) -> [&Counter; 2] {
        [&self.tick_counter, &self.can_tick_counter]
    }
}

// ── Model ──────────────────────────────────────────────────────────────────

/// Everything the emitter needs to render one block.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedBlockModel {
    pub block_name: String,
    pub nickname: String,
    pub inputs: Record,
    pub outputs: Record,
    pub config: ConfigRecord,
    pub internal: InternalRecord,
    pub behavior: BlockBehavior,
}

impl GeneratedBlockModel {
    pub fn new(schema: BlockSchema, behavior: BlockBehavior) -> Self {
        GeneratedBlockModel {
            block_name: schema.block_name,
            nickname: schema.nickname,
            inputs: schema.inputs,
            outputs: schema.outputs,
            config: schema.config,
            internal: schema.internal,
            behavior,
        }
    }

    /// True if any message resolved, i.e. the block depends on the
    /// database's C codec.
    pub fn uses_codec(&self) -> bool {
        !self.behavior.transmit.is_empty() || !self.behavior.receive.is_empty()
    }

    /// Header of the database codec, relative to the block source.
    pub fn codec_header(&self) -> String {
        format!("can/{}.h", self.nickname)
    }

    /// Pretty JSON for `--emit model`.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
