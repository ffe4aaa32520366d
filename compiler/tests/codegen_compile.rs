// Integration tests: verify that generated C blocks compile and behave.
//
// Two categories:
//   1. Syntax checks: each block shape is compiled with -fsyntax-only
//   2. Runtime: a block is linked against a stub codec and a harness main
//
// The codec header `can/<nickname>.h` is normally produced by a DBC code
// generator; these tests write a minimal stand-in derived from the fixture.
// Complements the unit tests in emit.rs which verify structural properties
// of generated C strings without invoking a compiler.
// Skipped automatically if no C compiler is found.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use blockgen::canon::canonicalize;
use blockgen::catalog::{Catalog, SignalDescriptor};

fn blockgen_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_blockgen"))
}

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vehicle.dbc")
}

fn find_c_compiler() -> Option<String> {
    for compiler in &["cc", "gcc", "clang"] {
        if Command::new(compiler)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
        {
            return Some(compiler.to_string());
        }
    }
    None
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Unique counter for temp dir names (avoids collisions in parallel tests).
static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn fresh_dir() -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("blockgen_cc_{}_{}", std::process::id(), n));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("can")).expect("failed to create temp dir");
    dir
}

/// Raw member type a DBC code generator would pick for a signal.
fn raw_type(sig: &SignalDescriptor) -> &'static str {
    let bits = [8u32, 16, 32, 64]
        .into_iter()
        .find(|&b| sig.bit_length <= b)
        .unwrap_or(64);
    match (bits, sig.is_signed) {
        (8, false) => "uint8_t",
        (16, false) => "uint16_t",
        (32, false) => "uint32_t",
        (_, false) => "uint64_t",
        (8, true) => "int8_t",
        (16, true) => "int16_t",
        (32, true) => "int32_t",
        (_, true) => "int64_t",
    }
}

/// Codec header declaring pack/unpack and per-signal encode/decode for
/// every message in the catalog. With `definitions`, also emits trivial
/// bodies so a block can be linked and run.
fn codec_header(catalog: &Catalog, nickname: &str, definitions: bool) -> String {
    let mut out = String::new();
    let guard = format!("{}_CODEC_H", nickname.to_uppercase());
    let _ = writeln!(out, "#ifndef {0}\n#define {0}\n", guard);
    out.push_str("#include <stdint.h>\n#include <stddef.h>\n#include <string.h>\n\n");
    for msg in catalog.messages() {
        let p = format!("{}_{}", nickname, canonicalize(&msg.name));
        // Signals whose names collide after canonicalization share a member.
        let mut seen = HashSet::new();
        let signals: Vec<&SignalDescriptor> = msg
            .signals
            .iter()
            .filter(|sig| seen.insert(canonicalize(&sig.name)))
            .collect();
        let _ = writeln!(out, "struct {}_t {{", p);
        for sig in &signals {
            let _ = writeln!(out, "    {} {};", raw_type(sig), canonicalize(&sig.name));
        }
        out.push_str("};\n\n");

        if definitions {
            let _ = writeln!(
                out,
                "static int {0}_pack(uint8_t *dst_p, const struct {0}_t *src_p, size_t size) {{\n    (void)src_p;\n    memset(dst_p, 0, size);\n    return (int)size;\n}}",
                p
            );
            let _ = writeln!(
                out,
                "static int {0}_unpack(struct {0}_t *dst_p, const uint8_t *src_p, size_t size) {{\n    (void)src_p;\n    (void)size;\n    memset(dst_p, 0, sizeof(*dst_p));\n    return 0;\n}}",
                p
            );
        } else {
            let _ = writeln!(
                out,
                "int {0}_pack(uint8_t *dst_p, const struct {0}_t *src_p, size_t size);",
                p
            );
            let _ = writeln!(
                out,
                "int {0}_unpack(struct {0}_t *dst_p, const uint8_t *src_p, size_t size);",
                p
            );
        }

        for sig in &signals {
            let s = canonicalize(&sig.name);
            let ty = raw_type(sig);
            if definitions {
                let _ = writeln!(
                    out,
                    "static {0} {1}_{2}_encode(double value) {{ return ({0})value; }}",
                    ty, p, s
                );
                let _ = writeln!(
                    out,
                    "static double {}_{}_decode({} value) {{ return (double)value; }}",
                    p, s, ty
                );
            } else {
                let _ = writeln!(out, "{} {}_{}_encode(double value);", ty, p, s);
                let _ = writeln!(out, "double {}_{}_decode({} value);", p, s, ty);
            }
        }
        out.push('\n');
    }
    let _ = writeln!(out, "#endif");
    out
}

/// Generate `<name>.h`/`<name>.c` plus the codec header into a fresh dir.
fn generate_block(name: &str, extra: &[&str], definitions: bool) -> PathBuf {
    let dir = fresh_dir();
    let dbc = fixture();
    let mut args = vec![
        name,
        "--nickname",
        "veh",
        "--dbc",
        dbc.to_str().unwrap(),
        "--out-dir",
        dir.to_str().unwrap(),
    ];
    args.extend_from_slice(extra);
    let out = Command::new(blockgen_binary())
        .args(&args)
        .output()
        .expect("failed to run blockgen");
    assert!(
        out.status.success(),
        "blockgen failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let catalog = Catalog::load_dbc(&dbc).expect("fixture should load");
    std::fs::write(
        dir.join("can").join("veh.h"),
        codec_header(&catalog, "veh", definitions),
    )
    .expect("failed to write codec header");
    dir
}

/// Generate a block and syntax-check its source.
fn assert_block_compiles(name: &str, extra: &[&str]) {
    let cc = match find_c_compiler() {
        Some(c) => c,
        None => {
            eprintln!("SKIP: no C compiler found");
            return;
        }
    };
    let dir = generate_block(name, extra, false);
    let source = dir.join(format!("{}.c", name));
    let result = Command::new(&cc)
        .arg("-std=c99")
        .arg("-Wall")
        .arg("-fsyntax-only")
        .arg("-I")
        .arg(dir.to_str().unwrap())
        .arg(source.to_str().unwrap())
        .output()
        .expect("failed to run C compiler");
    assert!(
        result.status.success(),
        "C compilation failed for {}:\n{}\n--- source ---\n{}",
        name,
        String::from_utf8_lossy(&result.stderr),
        std::fs::read_to_string(&source).unwrap_or_default()
    );
    let _ = std::fs::remove_dir_all(&dir);
}

// ── Syntax checks ───────────────────────────────────────────────────────────

#[test]
fn full_block_compiles() {
    assert_block_compiles("vcu", &["-i", "0x100,257", "-o", "512,0x18FF50FE"]);
}

#[test]
fn transmit_only_block_compiles() {
    assert_block_compiles("sender", &["-i", "0x101"]);
}

#[test]
fn receive_only_block_compiles() {
    assert_block_compiles("monitor", &["-o", "0x18FF50FE"]);
}

#[test]
fn empty_block_compiles() {
    assert_block_compiles("idle", &[]);
}

// ── Runtime ─────────────────────────────────────────────────────────────────

const HARNESS: &str = r#"#include <string.h>
#include "rt.h"

static uint32_t sent[8];
static int n_sent;

static void record(uint32_t id, bool ext, uint8_t len, uint8_t* buffer) {
    (void)ext;
    (void)len;
    (void)buffer;
    if (n_sent < 8) {
        sent[n_sent] = id;
    }
    n_sent++;
}

int main(void) {
    struct rt_data_t d;
    memset(&d, 0, sizeof(d));
    rt_init(&d);
    if (d.config.ticks_per_s != 100) return 10;
    d.config.can_send = record;
    d.inputs.drive_mode = 3;

    for (int i = 0; i < 4; i++) rt_tick(&d);
    if (n_sent != 4) return 1;
    if (sent[0] != 0x100 || sent[1] != 0x101 || sent[2] != 0x100 || sent[3] != 0x101) return 2;

    uint8_t frame[8] = {0};
    for (int i = 4; i < 200; i++) {
        rt_tick(&d);
        rt_parse_can(0x200, frame, &d);
    }
    if (d.outputs.timeout) return 3;
    if (d.inputs.drive_mode != 3) return 4;

    rt_tick(&d);
    if (!d.outputs.timeout) return 5;
    if (d.inputs.drive_mode != 0) return 6;
    return 0;
}
"#;

#[test]
fn block_runs_round_robin_and_watchdog() {
    let cc = match find_c_compiler() {
        Some(c) => c,
        None => {
            eprintln!("SKIP: no C compiler found");
            return;
        }
    };
    let dir = generate_block("rt", &["-i", "0x100,257", "-o", "512"], true);
    std::fs::write(dir.join("main.c"), HARNESS).expect("failed to write harness");
    let exe = dir.join("rt_harness");

    let build = Command::new(&cc)
        .arg("-std=c99")
        .arg("-I")
        .arg(dir.to_str().unwrap())
        .arg(dir.join("main.c").to_str().unwrap())
        .arg(dir.join("rt.c").to_str().unwrap())
        .arg("-o")
        .arg(exe.to_str().unwrap())
        .arg("-lm")
        .output()
        .expect("failed to run C compiler");
    assert!(
        build.status.success(),
        "link failed:\n{}",
        String::from_utf8_lossy(&build.stderr)
    );

    let run = Command::new(&exe).output().expect("failed to run harness");
    assert_eq!(run.status.code(), Some(0), "harness reported a failed check");
    let _ = std::fs::remove_dir_all(&dir);
}
