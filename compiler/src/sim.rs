// sim.rs — Reference interpreter for generated blocks
//
// Executes a GeneratedBlockModel's initialize / receive / advance entry
// points the way the emitted C does, with C storage semantics: integer
// fields wrap to their width, float fields are single precision, the
// scheduling counter is a wrapping u16 and the watchdog counter a u16 that
// saturates at its ceiling. Used to check runtime properties of a block
// without a C toolchain.
//
// Preconditions: `model` built from a schema without error diagnostics.
// Postconditions: none beyond the per-method contracts below.
// Failure modes: none. Unknown frame ids are ignored by `receive`.
// Side effects: calls the host's `CanSend` from `advance`.

use crate::behavior::{Conversion, SignalOp};
use crate::catalog::MessageDescriptor;
use crate::codec;
use crate::model::{CounterPolicy, GeneratedBlockModel, Record};
use crate::signal_type::StorageType;

// ── Host capability ─────────────────────────────────────────────────────────

/// Transmit capability supplied by the embedding host.
pub trait CanSend {
    fn can_send(&mut self, id: u32, ext: bool, len: u8, buffer: &[u8]);
}

/// A frame handed to the host by `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxFrame {
    pub id: u32,
    pub ext: bool,
    pub len: u8,
    pub data: Vec<u8>,
}

/// Recording host: keeps every transmitted frame in order.
impl CanSend for Vec<TxFrame> {
    fn can_send(&mut self, id: u32, ext: bool, len: u8, buffer: &[u8]) {
        self.push(TxFrame {
            id,
            ext,
            len,
            data: buffer.to_vec(),
        });
    }
}

// ── Field values ────────────────────────────────────────────────────────────

/// Contents of one record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f32),
}

impl Value {
    pub fn zero(ty: StorageType) -> Self {
        match ty {
            StorageType::Float => Value::Float(0.0),
            _ => Value::Int(0),
        }
    }

    pub fn is_zero(&self) -> bool {
        match *self {
            Value::Int(i) => i == 0,
            Value::Float(f) => f == 0.0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f as f64,
        }
    }

    /// Integer conversion as a C assignment to an integer member performs it.
    fn as_raw(&self) -> i64 {
        match *self {
            Value::Int(i) => i,
            Value::Float(f) => f as i64,
        }
    }
}

/// Store an integer into a field of type `ty`.
pub fn store_int(ty: StorageType, raw: i64) -> Value {
    match ty.int_layout() {
        Some((bits, signed)) => Value::Int(wrap(raw, bits, signed)),
        None => Value::Float(raw as f32),
    }
}

/// Store a floating-point value into a field of type `ty`.
pub fn store_float(ty: StorageType, x: f64) -> Value {
    match ty.int_layout() {
        Some((bits, signed)) => Value::Int(wrap(x as i64, bits, signed)),
        None => Value::Float(x as f32),
    }
}

fn wrap(raw: i64, bits: u32, signed: bool) -> i64 {
    if bits >= 64 {
        return raw;
    }
    let mask = (1u64 << bits) - 1;
    let v = raw as u64 & mask;
    if signed && (v >> (bits - 1)) & 1 == 1 {
        (v | !mask) as i64
    } else {
        v as i64
    }
}

// ── Runtime ─────────────────────────────────────────────────────────────────

/// One live instance of a generated block, equivalent to a `<name>_data_t`
/// plus its host.
pub struct BlockRuntime<'m, S: CanSend> {
    model: &'m GeneratedBlockModel,
    inputs: Vec<Value>,
    outputs: Vec<Value>,
    pub ticks_per_s: u8,
    pub tick_counter: u16,
    pub can_tick_counter: u16,
    host: S,
}

impl<'m, S: CanSend> BlockRuntime<'m, S> {
    /// Zeroed data record with `host` installed as the transmit capability,
    /// followed by the initialize entry point.
    pub fn new(model: &'m GeneratedBlockModel, host: S) -> Self {
        let zeroed = |r: &Record| r.iter().map(|f| Value::zero(f.ty)).collect();
        let mut rt = BlockRuntime {
            model,
            inputs: zeroed(&model.inputs),
            outputs: zeroed(&model.outputs),
            ticks_per_s: 0,
            tick_counter: 0,
            can_tick_counter: 0,
            host,
        };
        rt.init();
        rt
    }

    /// The initialize entry point.
    pub fn init(&mut self) {
        self.tick_counter = 0;
        self.can_tick_counter = 0;
        self.ticks_per_s = self.model.config.default_ticks_per_s;
    }

    pub fn host(&self) -> &S {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut S {
        &mut self.host
    }

    pub fn input(&self, name: &str) -> Option<Value> {
        self.model.inputs.position(name).map(|i| self.inputs[i])
    }

    pub fn output(&self, name: &str) -> Option<Value> {
        self.model.outputs.position(name).map(|i| self.outputs[i])
    }

    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    /// Write an inputs-record field as the host would, with C conversion to
    /// the field's type. Returns false for an unknown field.
    pub fn set_input(&mut self, name: &str, value: f64) -> bool {
        match self.model.inputs.position(name) {
            Some(i) => {
                let ty = self.model.inputs.fields[i].ty;
                self.inputs[i] = match ty {
                    StorageType::Float => store_float(ty, value),
                    _ => store_int(ty, value as i64),
                };
                true
            }
            None => false,
        }
    }

    /// True while the timeout flag is set. Blocks without the flag report
    /// false.
    pub fn timed_out(&self) -> bool {
        self.model
            .behavior
            .watchdog
            .timeout_field
            .as_deref()
            .and_then(|f| self.output(f))
            .is_some_and(|v| !v.is_zero())
    }

    /// The receive entry point. Returns true if `frame_id` matched a
    /// resolved output message.
    pub fn receive(&mut self, frame_id: u32, data: &[u8]) -> bool {
        let model = self.model;
        let Some(handler) = model
            .behavior
            .receive
            .iter()
            .find(|h| h.frame_id == frame_id)
        else {
            return false;
        };
        let raws = codec::unpack(&handler.descriptor, data, handler.length as usize);
        for op in &handler.signals {
            let Some(i) = model.outputs.position(&op.field) else {
                continue;
            };
            let ty = model.outputs.fields[i].ty;
            let raw = raws[op.signal_index];
            self.outputs[i] = match op.conversion {
                Conversion::Copy => store_int(ty, raw),
                Conversion::Transform { .. } => {
                    let sig = &handler.descriptor.signals[op.signal_index];
                    store_float(ty, codec::decode(sig, raw))
                }
            };
        }
        true
    }

    /// The advance entry point: transmit one scheduled frame, evaluate the
    /// watchdog, then step both counters.
    pub fn advance(&mut self) {
        let model = self.model;
        let behavior = &model.behavior;

        if let Some(slot) = behavior
            .transmit
            .iter()
            .find(|s| self.tick_counter as usize % s.modulus == s.slot)
        {
            let data = self.pack_inputs(&slot.descriptor, &slot.signals, slot.length);
            self.host
                .can_send(slot.frame_id, slot.is_extended, slot.length, &data);
        }

        let threshold = self.ticks_per_s as u32 * behavior.watchdog.seconds;
        let timed_out = self.can_tick_counter as u32 >= threshold;
        if let Some(i) = behavior
            .watchdog
            .timeout_field
            .as_deref()
            .and_then(|f| model.outputs.position(f))
        {
            self.outputs[i] = Value::Int(timed_out as i64);
        }
        if timed_out {
            for name in &behavior.watchdog.failsafe_fields {
                if let Some(i) = model.inputs.position(name) {
                    self.inputs[i] = Value::zero(model.inputs.fields[i].ty);
                }
            }
        }

        for step in &behavior.advance {
            let counter = if step.counter == model.internal.tick_counter.name {
                &mut self.tick_counter
            } else {
                &mut self.can_tick_counter
            };
            match step.policy {
                CounterPolicy::Wrapping => *counter = counter.wrapping_add(1),
                CounterPolicy::Saturating { ceiling } => {
                    if *counter < ceiling {
                        *counter += 1;
                    }
                }
            }
        }
    }

    fn pack_inputs(&self, desc: &MessageDescriptor, ops: &[SignalOp], length: u8) -> Vec<u8> {
        let mut raws = vec![0i64; desc.signals.len()];
        for op in ops {
            let Some(i) = self.model.inputs.position(&op.field) else {
                continue;
            };
            let value = self.inputs[i];
            raws[op.signal_index] = match op.conversion {
                Conversion::Copy => value.as_raw(),
                Conversion::Transform { .. } => {
                    codec::encode(&desc.signals[op.signal_index], value.as_f64())
                }
            };
        }
        codec::pack(desc, &raws, length as usize)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
