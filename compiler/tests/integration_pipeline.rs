// Integration tests for the blockgen command-line driver.
//
// These tests run the built binary and verify:
// - each --emit target and the files written by `--emit all`
// - diagnostics on stderr for recoverable problems
// - exit codes: 0 success, 1 compile errors, 2 catalog or I/O failure

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};

fn blockgen_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_blockgen"))
}

fn fixture() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/vehicle.dbc")
}

/// Unique counter for temp dir names (avoids collisions in parallel tests).
static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn fresh_out_dir() -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("blockgen_cli_{}_{}", std::process::id(), n));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn run(args: &[&str]) -> Output {
    Command::new(blockgen_binary())
        .args(args)
        .output()
        .expect("failed to run blockgen")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn emit_all_writes_header_and_source() {
    let dir = fresh_out_dir();
    let dbc = fixture();
    let out = run(&[
        "vcu",
        "--dbc",
        dbc.to_str().unwrap(),
        "-i",
        "0x100",
        "-o",
        "0x200",
        "--out-dir",
        dir.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let header = std::fs::read_to_string(dir.join("vcu.h")).expect("missing vcu.h");
    let source = std::fs::read_to_string(dir.join("vcu.c")).expect("missing vcu.c");
    assert!(header.contains("struct vcu_data_t {"));
    assert!(source.contains("#include \"can/vcu.h\""));
    assert!(source.contains("vcu_vcu_command_pack(buf, &s, 8);"));
    let _ = std::fs::remove_dir_all(&dir);
}

fn emit_all_into(dir: &Path) -> Output {
    let dbc = fixture();
    run(&[
        "vcu",
        "--dbc",
        dbc.to_str().unwrap(),
        "-i",
        "0x100",
        "--out-dir",
        dir.to_str().unwrap(),
    ])
}

#[test]
fn failed_source_write_leaves_no_header() {
    let dir = fresh_out_dir();
    // A directory in the source's place makes the final rename fail.
    std::fs::create_dir(dir.join("vcu.c")).unwrap();
    let out = emit_all_into(&dir);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("vcu.c"), "stderr: {}", stderr(&out));
    assert!(!dir.join("vcu.h").exists());
    assert!(!dir.join("vcu.h.tmp").exists());
    assert!(!dir.join("vcu.c.tmp").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failed_staging_leaves_no_files() {
    let dir = fresh_out_dir();
    std::fs::create_dir(dir.join("vcu.c.tmp")).unwrap();
    let out = emit_all_into(&dir);
    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.join("vcu.h").exists());
    assert!(!dir.join("vcu.h.tmp").exists());
    assert!(!dir.join("vcu.c").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emit_all_replaces_existing_files() {
    let dir = fresh_out_dir();
    std::fs::write(dir.join("vcu.h"), "stale").unwrap();
    let out = emit_all_into(&dir);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let header = std::fs::read_to_string(dir.join("vcu.h")).unwrap();
    assert!(header.contains("struct vcu_data_t {"));
    assert!(!dir.join("vcu.h.tmp").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn help_and_verbose_name_the_codec_dependency() {
    let help = run(&["--help"]);
    assert!(help.status.success());
    assert!(stdout(&help).contains("can/<nickname>.c"));

    let dir = fresh_out_dir();
    let out = run(&["drive", "--nickname", "veh", "--verbose", "--out-dir", dir.to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("blockgen: note: codec can/veh.h"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn emit_header_prints_to_stdout() {
    let dbc = fixture();
    let out = run(&[
        "drive",
        "--nickname",
        "veh",
        "--dbc",
        dbc.to_str().unwrap(),
        "-o",
        "512",
        "--emit",
        "header",
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.starts_with("// Generated by blockgen"));
    assert!(text.contains("    uint8_t timeout;\n"));
}

#[test]
fn emit_model_is_json() {
    let dbc = fixture();
    let out = run(&[
        "drive",
        "--dbc",
        dbc.to_str().unwrap(),
        "-i",
        "256,257",
        "--emit",
        "model",
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let value: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("invalid JSON");
    assert_eq!(value["block_name"], "drive");
    assert_eq!(value["nickname"], "drive");
    assert_eq!(value["inputs"]["fields"].as_array().unwrap().len(), 5);
    assert_eq!(value["behavior"]["transmit"][1]["slot"], 1);
    assert_eq!(value["behavior"]["transmit"][1]["modulus"], 2);
    assert!(value["behavior"]["watchdog"]["timeout_field"].is_null());
}

#[test]
fn emit_build_info_is_json() {
    let dbc = fixture();
    let out = run(&["drive", "--dbc", dbc.to_str().unwrap(), "--emit", "build-info"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let value: serde_json::Value = serde_json::from_str(&stdout(&out)).expect("invalid JSON");
    assert_eq!(value["catalog_fingerprint"].as_str().unwrap().len(), 64);
    assert_eq!(value["compiler_version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn ticks_per_s_flows_into_init() {
    let out = run(&["idle", "--ticks-per-s", "50", "--emit", "source"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("    data->config.ticks_per_s = 50;\n"));
}

#[test]
fn unresolved_and_malformed_ids_warn_but_succeed() {
    let dbc = fixture();
    let out = run(&[
        "drive",
        "--dbc",
        dbc.to_str().unwrap(),
        "-o",
        "512,0x7FF,bogus",
        "--emit",
        "header",
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let err = stderr(&out);
    assert!(
        err.contains("blockgen: warning[W0102]: invalid output frame id 'bogus'"),
        "stderr: {}",
        err
    );
    assert!(
        err.contains("blockgen: warning[W0101]: output frame id 0x7FF not found in catalog"),
        "stderr: {}",
        err
    );
    assert!(stdout(&out).contains("uint16_t motor_speed;"));
}

#[test]
fn no_catalog_means_every_id_is_unresolved() {
    let out = run(&["drive", "-i", "0x100", "--emit", "header"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("W0101"));
    assert!(stdout(&out).contains("struct drive_inputs_t {\n    uint8_t reserved;\n};"));
}

#[test]
fn field_collision_fails_with_exit_1() {
    let dbc = fixture();
    let out = run(&[
        "charger",
        "--dbc",
        dbc.to_str().unwrap(),
        "-o",
        "0x300",
        "--emit",
        "source",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("error[E0201]"), "stderr: {}", stderr(&out));
    assert!(stdout(&out).is_empty());
}

#[test]
fn invalid_block_name_fails_with_exit_1() {
    let out = run(&["my-block", "--emit", "header"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("error[E0202]"));
}

#[test]
fn missing_catalog_fails_with_exit_2() {
    let out = run(&["drive", "--dbc", "/nonexistent/blockgen/vehicle.dbc"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("error[E0001]"), "stderr: {}", stderr(&out));
}

#[test]
fn unparsable_catalog_fails_with_exit_2() {
    let dir = fresh_out_dir();
    let dbc = dir.join("broken.dbc");
    std::fs::write(&dbc, "VERSION \"\"\n\nBO_ 1 Broken 8 X\n").unwrap();
    let out = run(&["drive", "--dbc", dbc.to_str().unwrap(), "--emit", "header"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("error[E0002]"), "stderr: {}", stderr(&out));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn verbose_reports_pass_timing() {
    let out = run(&["idle", "--emit", "header", "--verbose"]);
    assert!(out.status.success());
    let err = stderr(&out);
    for pass in ["parse_ids", "load_catalog", "build_schema", "synthesize", "emit"] {
        assert!(
            err.contains(&format!("blockgen: {} complete", pass)),
            "missing {} in:\n{}",
            pass,
            err
        );
    }
}
