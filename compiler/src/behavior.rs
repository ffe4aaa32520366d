// behavior.rs — Runtime behavior synthesis
//
// Derives the generated block's tick-driven state machine from its schema:
// the round-robin transmit slots run by `tick`, the receive handlers run by
// `parse_can`, the block-wide watchdog and the counter advance.
//
// Preconditions: `schema` came from `build_schema` without error diagnostics.
// Postconditions: one transmit slot per resolved input message, slot i of k
//   fires when `tick_counter % k == i`; one receive handler per resolved
//   output message; the watchdog zeroes every inputs-record field.
// Failure modes: none (verification is a separate step, see
//   `verify_behavior`).
// Side effects: none.

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::MessageDescriptor;
use crate::model::{CounterPolicy, CAN_TICK_CEILING, TIMEOUT_FIELD};
use crate::schema::{BlockSchema, ResolvedMessage};

/// Seconds of advance calls after initialization before the watchdog fires.
pub const WATCHDOG_SECONDS: u32 = 2;

// ── Public types ────────────────────────────────────────────────────────────

/// How a record field and a signal's raw value relate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conversion {
    /// Raw value copied as is.
    Copy,
    /// `value = raw * scale + offset`, via the codec's encode/decode.
    Transform { scale: f64, offset: f64 },
}

/// Moves one signal between the codec struct and a record field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalOp {
    /// Record field, also the codec struct member.
    pub field: String,
    /// Index of the signal within its message.
    pub signal_index: usize,
    pub conversion: Conversion,
}

/// One arm of the round-robin transmit schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmitSlot {
    /// Fires when `tick_counter % modulus == slot`.
    pub slot: usize,
    pub modulus: usize,
    pub frame_id: u32,
    pub is_extended: bool,
    pub length: u8,
    pub message: String,
    pub signals: Vec<SignalOp>,
    #[serde(skip)]
    pub descriptor: MessageDescriptor,
}

/// Decodes one output message into the outputs record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiveHandler {
    pub frame_id: u32,
    pub is_extended: bool,
    pub length: u8,
    pub message: String,
    pub signals: Vec<SignalOp>,
    #[serde(skip)]
    pub descriptor: MessageDescriptor,
}

/// Block-wide elapsed-time watchdog.
///
/// Fires once `can_tick_counter >= ticks_per_s * seconds`. Reception never
/// resets the counter, so after the grace period the flag stays set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Watchdog {
    pub seconds: u32,
    /// Outputs-record flag to update; `None` when the block has no output
    /// signal fields.
    pub timeout_field: Option<String>,
    /// Inputs-record fields forced to zero while timed out.
    pub failsafe_fields: Vec<String>,
}

/// One counter increment in the advance step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterStep {
    pub counter: &'static str,
    pub policy: CounterPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockBehavior {
    pub transmit: Vec<TransmitSlot>,
    pub receive: Vec<ReceiveHandler>,
    pub watchdog: Watchdog,
    /// Increments run after transmit and watchdog, in order.
    pub advance: Vec<CounterStep>,
}

// ── Synthesis ───────────────────────────────────────────────────────────────

pub fn synthesize(schema: &BlockSchema) -> BlockBehavior {
    let modulus = schema.input_messages.len();
    let transmit = schema
        .input_messages
        .iter()
        .enumerate()
        .map(|(slot, msg)| TransmitSlot {
            slot,
            modulus,
            frame_id: msg.message.frame_id,
            is_extended: msg.message.is_extended,
            length: msg.message.length,
            message: msg.c_name.clone(),
            signals: signal_ops(msg),
            descriptor: msg.message.clone(),
        })
        .collect();

    let receive = schema
        .output_messages
        .iter()
        .map(|msg| ReceiveHandler {
            frame_id: msg.message.frame_id,
            is_extended: msg.message.is_extended,
            length: msg.message.length,
            message: msg.c_name.clone(),
            signals: signal_ops(msg),
            descriptor: msg.message.clone(),
        })
        .collect();

    let watchdog = Watchdog {
        seconds: WATCHDOG_SECONDS,
        timeout_field: schema
            .outputs
            .get(TIMEOUT_FIELD)
            .map(|f| f.name.clone()),
        failsafe_fields: schema.inputs.iter().map(|f| f.name.clone()).collect(),
    };

    // Watchdog counter first; the scheduling counter has no ceiling.
    let advance = vec![
        CounterStep {
            counter: schema.internal.can_tick_counter.name,
            policy: schema.internal.can_tick_counter.policy,
        },
        CounterStep {
            counter: schema.internal.tick_counter.name,
            policy: schema.internal.tick_counter.policy,
        },
    ];

    BlockBehavior {
        transmit,
        receive,
        watchdog,
        advance,
    }
}

fn signal_ops(msg: &ResolvedMessage) -> Vec<SignalOp> {
    msg.bindings
        .iter()
        .map(|b| {
            let sig = &msg.message.signals[b.signal_index];
            let conversion = if sig.has_transform() {
                Conversion::Transform {
                    scale: sig.scale,
                    offset: sig.offset,
                }
            } else {
                Conversion::Copy
            };
            SignalOp {
                field: b.field.clone(),
                signal_index: b.signal_index,
                conversion,
            }
        })
        .collect()
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for the behavior postconditions.
#[derive(Debug, Clone)]
pub struct BehaviorCert {
    /// Every resolved input message owns exactly one slot and the slots are
    /// 0..k in id-list order.
    pub round_robin_complete: bool,
    /// Every resolved output message has one handler and no frame id is
    /// handled twice.
    pub receive_unique: bool,
    /// The watchdog zeroes every inputs-record field.
    pub failsafe_covers_inputs: bool,
    /// The watchdog counter saturates at the fixed ceiling.
    pub watchdog_saturates: bool,
}

impl crate::pass::StageCert for BehaviorCert {
    fn all_pass(&self) -> bool {
        self.round_robin_complete
            && self.receive_unique
            && self.failsafe_covers_inputs
            && self.watchdog_saturates
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("round_robin_complete", self.round_robin_complete),
            ("receive_unique", self.receive_unique),
            ("failsafe_covers_inputs", self.failsafe_covers_inputs),
            ("watchdog_saturates", self.watchdog_saturates),
        ]
    }
}

pub fn verify_behavior(behavior: &BlockBehavior, schema: &BlockSchema) -> BehaviorCert {
    let k = schema.input_messages.len();
    let round_robin_complete = behavior.transmit.len() == k
        && behavior
            .transmit
            .iter()
            .zip(&schema.input_messages)
            .enumerate()
            .all(|(i, (slot, msg))| {
                slot.slot == i && slot.modulus == k && slot.frame_id == msg.message.frame_id
            });

    let mut seen = HashSet::new();
    let receive_unique = behavior.receive.len() == schema.output_messages.len()
        && behavior.receive.iter().all(|h| seen.insert(h.frame_id));

    let failsafe_covers_inputs = schema
        .inputs
        .iter()
        .all(|f| behavior.watchdog.failsafe_fields.contains(&f.name));

    let watchdog_saturates = behavior.advance.iter().any(|step| {
        step.counter == schema.internal.can_tick_counter.name
            && step.policy
                == CounterPolicy::Saturating {
                    ceiling: CAN_TICK_CEILING,
                }
    });

    BehaviorCert {
        round_robin_complete,
        receive_unique,
        failsafe_covers_inputs,
        watchdog_saturates,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::interface::InterfaceSpec;
    use crate::pass::StageCert;
    use crate::schema::build_schema;

    const DBC: &str = r#"
BO_ 256 VcuCommand: 8 VCU
 SG_ TorqueRequest : 0|16@1- (0.1,0) [-3276.8|3276.7] "Nm" MCU
 SG_ EnableRequest : 16|1@1+ (1,0) [0|1] "" MCU

BO_ 257 VcuLimits: 4 VCU
 SG_ SpeedLimit : 0|16@1+ (1,0) [0|65535] "rpm" MCU

BO_ 512 MotorStatus: 8 MCU
 SG_ MotorSpeed : 0|16@1+ (1,0) [0|65535] "rpm" VCU
 SG_ MotorTemp : 16|8@1+ (1,-40) [-40|215] "degC" VCU
"#;

    fn schema(inputs: &[u32], outputs: &[u32]) -> BlockSchema {
        let catalog = Catalog::from_source(DBC, "behavior.dbc").unwrap();
        let spec = InterfaceSpec::new("drive", None)
            .with_inputs(inputs.iter().copied())
            .with_outputs(outputs.iter().copied());
        build_schema(&spec, &catalog).schema
    }

    #[test]
    fn round_robin_slots_follow_id_order() {
        let s = schema(&[257, 256], &[]);
        let b = synthesize(&s);
        let slots: Vec<_> = b
            .transmit
            .iter()
            .map(|t| (t.slot, t.modulus, t.frame_id))
            .collect();
        assert_eq!(slots, vec![(0, 2, 257), (1, 2, 256)]);
        assert_eq!(b.transmit[0].length, 4);
        assert_eq!(b.transmit[0].message, "vcu_limits");
    }

    #[test]
    fn modulus_counts_only_resolved_inputs() {
        let s = schema(&[0x7FF, 256], &[]);
        let b = synthesize(&s);
        assert_eq!(b.transmit.len(), 1);
        assert_eq!(b.transmit[0].modulus, 1);
    }

    #[test]
    fn conversions_follow_scale_and_offset() {
        let s = schema(&[256], &[512]);
        let b = synthesize(&s);
        let tx = &b.transmit[0].signals;
        assert_eq!(
            tx[0].conversion,
            Conversion::Transform {
                scale: 0.1,
                offset: 0.0
            }
        );
        assert_eq!(tx[1].conversion, Conversion::Copy);

        let rx = &b.receive[0].signals;
        assert_eq!(rx[0].conversion, Conversion::Copy);
        assert_eq!(
            rx[1].conversion,
            Conversion::Transform {
                scale: 1.0,
                offset: -40.0
            }
        );
    }

    #[test]
    fn watchdog_targets() {
        let s = schema(&[256, 257], &[512]);
        let b = synthesize(&s);
        assert_eq!(b.watchdog.seconds, 2);
        assert_eq!(b.watchdog.timeout_field.as_deref(), Some("timeout"));
        assert_eq!(
            b.watchdog.failsafe_fields,
            vec!["torque_request", "enable_request", "speed_limit"]
        );
    }

    #[test]
    fn no_outputs_means_no_timeout_flag() {
        let b = synthesize(&schema(&[256], &[]));
        assert!(b.watchdog.timeout_field.is_none());
        assert!(b.receive.is_empty());
    }

    #[test]
    fn counters_advance_watchdog_first() {
        let b = synthesize(&schema(&[], &[]));
        let names: Vec<_> = b.advance.iter().map(|c| c.counter).collect();
        assert_eq!(names, vec!["can_tick_counter", "tick_counter"]);
        assert!(b.transmit.is_empty());
    }

    #[test]
    fn synthesized_behavior_verifies() {
        for (i, o) in [(&[][..], &[][..]), (&[256, 257][..], &[512][..])] {
            let s = schema(i, o);
            let cert = verify_behavior(&synthesize(&s), &s);
            assert!(cert.all_pass(), "{:?}", cert.obligations());
        }
    }

    #[test]
    fn verification_catches_missing_slot() {
        let s = schema(&[256, 257], &[]);
        let mut b = synthesize(&s);
        b.transmit.pop();
        let cert = verify_behavior(&b, &s);
        assert!(!cert.round_robin_complete);
        assert!(!cert.all_pass());
    }

    #[test]
    fn descriptor_not_serialized() {
        let b = synthesize(&schema(&[256], &[]));
        let json = serde_json::to_string(&b).unwrap();
        assert!(!json.contains("descriptor"));
        assert!(json.contains("\"torque_request\""));
    }
}
