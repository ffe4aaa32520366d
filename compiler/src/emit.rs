// emit.rs — C code generation for blocks
//
// Renders a GeneratedBlockModel into the block's structural artifact
// (`<name>.h`: records, data aggregate, entry-point prototypes) and
// behavioral artifact (`<name>.c`: init, parse_can, tick).
//
// Preconditions: `model` built from a schema without error diagnostics.
// Postconditions: output is a pure function of `model`; no timestamps, no
//   host paths, no hash-map iteration order.
// Failure modes: none.
// Side effects: none.

use std::fmt::Write as _;

use crate::behavior::{Conversion, SignalOp};
use crate::model::{CounterPolicy, GeneratedBlockModel, Record};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifacts {
    pub header_name: String,
    pub header: String,
    pub source_name: String,
    pub source: String,
}

// ── Public entry points ─────────────────────────────────────────────────────

pub fn emit(model: &GeneratedBlockModel) -> GeneratedArtifacts {
    GeneratedArtifacts {
        header_name: format!("{}.h", model.block_name),
        header: emit_header(model),
        source_name: format!("{}.c", model.block_name),
        source: emit_source(model),
    }
}

pub fn emit_header(model: &GeneratedBlockModel) -> String {
    let mut ctx = EmitCtx::new(model);
    ctx.emit_header_guard_open();
    ctx.emit_records();
    ctx.emit_prototypes();
    ctx.emit_header_guard_close();
    ctx.out
}

pub fn emit_source(model: &GeneratedBlockModel) -> String {
    let mut ctx = EmitCtx::new(model);
    ctx.emit_source_preamble();
    ctx.emit_init();
    ctx.emit_parse_can();
    ctx.emit_tick();
    ctx.out
}

// ── Internal context ────────────────────────────────────────────────────────

const BANNER: &str = "// Generated by blockgen (Block Generator). Do not edit.\n";
const INDENT: &str = "    ";

struct EmitCtx<'a> {
    model: &'a GeneratedBlockModel,
    name: &'a str,
    out: String,
}

impl<'a> EmitCtx<'a> {
    fn new(model: &'a GeneratedBlockModel) -> Self {
        EmitCtx {
            model,
            name: &model.block_name,
            out: String::with_capacity(4096),
        }
    }

    fn guard(&self) -> String {
        format!("{}_BLOCK_H_", self.name.to_uppercase())
    }

    fn data_param(&self) -> String {
        format!("struct {}_data_t* data", self.name)
    }

    /// Prefix of the database codec symbols for one message.
    fn codec_prefix(&self, message: &str) -> String {
        format!("{}_{}", self.model.nickname, message)
    }

    // ── Header ──────────────────────────────────────────────────────────

    fn emit_header_guard_open(&mut self) {
        let guard = self.guard();
        self.out.push_str(BANNER);
        let _ = writeln!(self.out, "#ifndef {}", guard);
        let _ = writeln!(self.out, "#define {}", guard);
        self.out.push('\n');
        self.out.push_str("#include <stdint.h>\n");
        self.out.push_str("#include <stdbool.h>\n");
        self.out.push('\n');
    }

    fn emit_records(&mut self) {
        let model = self.model;
        self.emit_record("inputs", &model.inputs);
        self.emit_record("outputs", &model.outputs);

        let _ = writeln!(self.out, "struct {}_internal_t {{", self.name);
        for counter in model.internal.counters() {
            let _ = writeln!(self.out, "{}{} {};", INDENT, counter.ty, counter.name);
        }
        self.out.push_str("};\n\n");

        let config = &model.config;
        let _ = writeln!(self.out, "struct {}_config_t {{", self.name);
        let _ = writeln!(
            self.out,
            "{}{} {};",
            INDENT, config.tick_rate_type, config.tick_rate_field
        );
        let _ = writeln!(
            self.out,
            "{}void (*{})(uint32_t id, bool ext, uint8_t len, uint8_t* buffer);",
            INDENT, config.transmit_field
        );
        self.out.push_str("};\n\n");

        let _ = writeln!(self.out, "struct {}_data_t {{", self.name);
        for part in ["inputs", "outputs", "internal", "config"] {
            let _ = writeln!(self.out, "{}struct {}_{}_t {};", INDENT, self.name, part, part);
        }
        self.out.push_str("};\n\n");
    }

    fn emit_record(&mut self, part: &str, record: &Record) {
        let _ = writeln!(self.out, "struct {}_{}_t {{", self.name, part);
        if record.is_empty() {
            let _ = writeln!(self.out, "{}uint8_t reserved;", INDENT);
        }
        for field in record.iter() {
            let _ = writeln!(self.out, "{}{} {};", INDENT, field.ty, field.name);
        }
        self.out.push_str("};\n\n");
    }

    fn emit_prototypes(&mut self) {
        let data = self.data_param();
        let _ = writeln!(self.out, "void {}_init({});", self.name, data);
        let _ = writeln!(
            self.out,
            "void {}_parse_can(uint32_t can_id, uint8_t* buf, {});",
            self.name, data
        );
        let _ = writeln!(self.out, "void {}_tick({});", self.name, data);
        self.out.push('\n');
    }

    fn emit_header_guard_close(&mut self) {
        let guard = self.guard();
        let _ = writeln!(self.out, "#endif // {}", guard);
    }

    // ── Source ──────────────────────────────────────────────────────────

    fn emit_source_preamble(&mut self) {
        self.out.push_str(BANNER);
        self.out.push_str("#include <math.h>\n");
        self.out.push('\n');
        let _ = writeln!(self.out, "#include \"{}.h\"", self.name);
        if self.model.uses_codec() {
            let _ = writeln!(self.out, "#include \"{}\"", self.model.codec_header());
        }
        self.out.push('\n');
    }

    fn emit_init(&mut self) {
        let model = self.model;
        let data = self.data_param();
        let _ = writeln!(self.out, "void {}_init({}) {{", self.name, data);
        for counter in model.internal.counters() {
            let _ = writeln!(self.out, "{}data->internal.{} = 0;", INDENT, counter.name);
        }
        let _ = writeln!(
            self.out,
            "{}data->config.{} = {};",
            INDENT, model.config.tick_rate_field, model.config.default_ticks_per_s
        );
        self.out.push_str("}\n\n");
    }

    fn emit_parse_can(&mut self) {
        let model = self.model;
        let behavior = &model.behavior;
        let data = self.data_param();
        let _ = writeln!(
            self.out,
            "void {}_parse_can(uint32_t can_id, uint8_t* buf, {}) {{",
            self.name, data
        );
        if behavior.receive.is_empty() {
            let _ = writeln!(self.out, "{}(void)can_id;", INDENT);
            let _ = writeln!(self.out, "{}(void)buf;", INDENT);
            let _ = writeln!(self.out, "{}(void)data;", INDENT);
        }
        for handler in &behavior.receive {
            let prefix = self.codec_prefix(&handler.message);
            let _ = writeln!(self.out, "{}if (can_id == 0x{:X}) {{", INDENT, handler.frame_id);
            let _ = writeln!(self.out, "{0}{0}struct {1}_t s;", INDENT, prefix);
            let _ = writeln!(
                self.out,
                "{0}{0}{1}_unpack(&s, buf, {2});",
                INDENT, prefix, handler.length
            );
            for op in &handler.signals {
                let _ = writeln!(
                    self.out,
                    "{0}{0}data->outputs.{1} = {2};",
                    INDENT,
                    op.field,
                    convert(&prefix, op, "decode", &format!("s.{}", op.field))
                );
            }
            let _ = writeln!(self.out, "{}}}", INDENT);
        }
        self.out.push_str("}\n\n");
    }

    fn emit_tick(&mut self) {
        let data = self.data_param();
        let _ = writeln!(self.out, "void {}_tick({}) {{", self.name, data);
        self.emit_transmit_slots();
        self.emit_watchdog();
        self.emit_counter_advance();
        self.out.push_str("}\n");
    }

    fn emit_transmit_slots(&mut self) {
        let model = self.model;
        let behavior = &model.behavior;
        for slot in &behavior.transmit {
            let prefix = self.codec_prefix(&slot.message);
            let _ = writeln!(
                self.out,
                "{}if (data->internal.tick_counter % {} == {}) {{",
                INDENT, slot.modulus, slot.slot
            );
            let _ = writeln!(self.out, "{0}{0}struct {1}_t s = {{0}};", INDENT, prefix);
            for op in &slot.signals {
                let _ = writeln!(
                    self.out,
                    "{0}{0}s.{1} = {2};",
                    INDENT,
                    op.field,
                    convert(&prefix, op, "encode", &format!("data->inputs.{}", op.field))
                );
            }
            let _ = writeln!(
                self.out,
                "{0}{0}uint8_t buf[{1}];",
                INDENT,
                slot.length.max(1)
            );
            let _ = writeln!(
                self.out,
                "{0}{0}{1}_pack(buf, &s, {2});",
                INDENT, prefix, slot.length
            );
            let _ = writeln!(
                self.out,
                "{0}{0}data->config.{1}(0x{2:X}, {3}, {4}, buf);",
                INDENT,
                model.config.transmit_field,
                slot.frame_id,
                slot.is_extended,
                slot.length
            );
            let _ = writeln!(self.out, "{}}}", INDENT);
        }
        if !behavior.transmit.is_empty() {
            self.out.push('\n');
        }
    }

    fn emit_watchdog(&mut self) {
        let model = self.model;
        let watchdog = &model.behavior.watchdog;
        if watchdog.timeout_field.is_none() && watchdog.failsafe_fields.is_empty() {
            return;
        }
        let _ = writeln!(
            self.out,
            "{}if (data->internal.{} >= (data->config.{} * {})) {{",
            INDENT,
            model.internal.can_tick_counter.name,
            model.config.tick_rate_field,
            watchdog.seconds
        );
        if let Some(flag) = &watchdog.timeout_field {
            let _ = writeln!(self.out, "{0}{0}data->outputs.{1} = 1;", INDENT, flag);
        }
        for field in &watchdog.failsafe_fields {
            let _ = writeln!(self.out, "{0}{0}data->inputs.{1} = 0;", INDENT, field);
        }
        match &watchdog.timeout_field {
            Some(flag) => {
                let _ = writeln!(self.out, "{}}} else {{", INDENT);
                let _ = writeln!(self.out, "{0}{0}data->outputs.{1} = 0;", INDENT, flag);
                let _ = writeln!(self.out, "{}}}", INDENT);
            }
            None => {
                let _ = writeln!(self.out, "{}}}", INDENT);
            }
        }
        self.out.push('\n');
    }

    fn emit_counter_advance(&mut self) {
        let model = self.model;
        for step in &model.behavior.advance {
            match step.policy {
                CounterPolicy::Saturating { ceiling } => {
                    let _ = writeln!(
                        self.out,
                        "{}if (data->internal.{} < 0x{:X}) {{",
                        INDENT, step.counter, ceiling
                    );
                    let _ = writeln!(self.out, "{0}{0}data->internal.{1}++;", INDENT, step.counter);
                    let _ = writeln!(self.out, "{}}}", INDENT);
                }
                CounterPolicy::Wrapping => {
                    let _ = writeln!(self.out, "{}data->internal.{}++;", INDENT, step.counter);
                }
            }
        }
    }
}

/// Right-hand side moving one signal value, through the codec's
/// `<prefix>_<signal>_<dir>` function when the signal is scaled or offset.
fn convert(prefix: &str, op: &SignalOp, dir: &str, value: &str) -> String {
    match op.conversion {
        Conversion::Copy => value.to_string(),
        Conversion::Transform { .. } => format!("{}_{}_{}({})", prefix, op.field, dir, value),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
