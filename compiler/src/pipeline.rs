// pipeline.rs — Compilation state and pass orchestration
//
// Holds the block request, every pass artifact and the accumulated
// diagnostics, and runs the minimal set of passes for a given terminal
// PassId.
//
// Preconditions: `state.request` describes the block to build.
// Postconditions: all artifacts for required passes are populated, or has_error is set.
// Failure modes: any pass emitting error-level diagnostics; catalog load failure.
// Side effects: reads the catalog file; calls on_pass_complete after each
//   pass for immediate display.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::catalog::{Catalog, CatalogError};
use crate::diag::codes;
use crate::diag::{has_errors, Diagnostic};
use crate::emit::GeneratedArtifacts;
use crate::idlist::{parse_id_list, IdListKind};
use crate::interface::InterfaceSpec;
use crate::model::{GeneratedBlockModel, DEFAULT_TICKS_PER_S};
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::schema::BlockSchema;

// ── Request ────────────────────────────────────────────────────────────────

/// Where the message catalog comes from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    /// No database: every requested id is unresolved.
    None,
    File(PathBuf),
    /// In-memory DBC text; `origin` names it in diagnostics.
    Text { origin: String, text: String },
}

/// Raw user input, before any validation.
#[derive(Debug, Clone)]
pub struct BlockRequest {
    pub block_name: String,
    pub nickname: Option<String>,
    /// Comma-separated input frame ids, as typed.
    pub inputs: Option<String>,
    /// Comma-separated output frame ids, as typed.
    pub outputs: Option<String>,
    pub ticks_per_s: u8,
    pub catalog: CatalogSource,
}

impl BlockRequest {
    pub fn new(block_name: impl Into<String>) -> Self {
        BlockRequest {
            block_name: block_name.into(),
            nickname: None,
            inputs: None,
            outputs: None,
            ticks_per_s: DEFAULT_TICKS_PER_S,
            catalog: CatalogSource::None,
        }
    }
}

// ── Artifact storage ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct Artifacts {
    pub interface: Option<InterfaceSpec>,
    pub catalog: Option<Catalog>,
    pub schema: Option<BlockSchema>,
    pub model: Option<GeneratedBlockModel>,
    pub generated: Option<GeneratedArtifacts>,
}

/// Provenance metadata for reproducible builds and cache-key use.
///
/// `interface_hash`: SHA-256 of `InterfaceSpec::canonical_text()`.
/// `catalog_fingerprint`: SHA-256 of `Catalog::canonical_json()`.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub interface_hash: [u8; 32],
    pub catalog_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

#[derive(Serialize)]
struct BuildInfo<'a> {
    interface_hash: String,
    catalog_fingerprint: String,
    manifest_schema_version: u32,
    compiler_version: &'a str,
}

impl Provenance {
    /// Hex string of the interface hash (64 characters).
    pub fn interface_hash_hex(&self) -> String {
        bytes_to_hex(&self.interface_hash)
    }

    /// Hex string of the catalog fingerprint (64 characters).
    pub fn catalog_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.catalog_fingerprint)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        let info = BuildInfo {
            interface_hash: self.interface_hash_hex(),
            catalog_fingerprint: self.catalog_fingerprint_hex(),
            manifest_schema_version: 1,
            compiler_version: self.compiler_version,
        };
        let mut json = serde_json::to_string_pretty(&info).unwrap_or_default();
        json.push('\n');
        json
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from the validated interface and the loaded catalog.
pub fn compute_provenance(spec: &InterfaceSpec, catalog: &Catalog) -> Provenance {
    Provenance {
        interface_hash: sha256(&spec.canonical_text()),
        catalog_fingerprint: sha256(&catalog.canonical_json()),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

/// Holds all compilation artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub request: BlockRequest,
    pub artifacts: Artifacts,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(request: BlockRequest) -> Self {
        Self {
            request,
            artifacts: Artifacts::default(),
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pass '{}' failed", descriptor(self.failing_pass).name)
    }
}

impl std::error::Error for PipelineError {}

// ── Per-pass bookkeeping ───────────────────────────────────────────────────

/// Per-pass post-processing: callback, accumulate, verbose, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "blockgen: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

/// An upstream artifact every later pass depends on. Missing only if the
/// pass order is wrong, which is reported as a failure of `pass_id`.
fn upstream<T>(artifact: Option<&T>, pass_id: PassId) -> Result<&T, PipelineError> {
    artifact.ok_or(PipelineError {
        failing_pass: pass_id,
    })
}

fn catalog_diagnostic(err: &CatalogError) -> Diagnostic {
    let code = match err {
        CatalogError::Io { .. } => codes::E0001,
        CatalogError::Parse { .. } => codes::E0002,
        CatalogError::DuplicateFrameId { .. } => codes::E0003,
    };
    Diagnostic::error(err.to_string()).with_code(code)
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose → error check.
///
/// Preconditions: `state.request` is set.
/// Postconditions: artifacts for all passes in `required_passes(terminal)` are populated,
///   or `state.has_error` is true. `state.provenance` is set once both the
///   interface and the catalog are available.
/// Failure modes: any pass producing error-level diagnostics; behavior cert failure.
/// Side effects: reads the catalog file; calls `on_pass_complete` after each pass.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    verbose: bool,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        let t = Instant::now();
        let diags = match pass_id {
            PassId::ParseIds => run_parse_ids(state),
            PassId::LoadCatalog => run_load_catalog(state),
            PassId::BuildSchema => run_build_schema(state)?,
            PassId::Synthesize => run_synthesize(state)?,
            PassId::Emit => run_emit(state)?,
        };
        let elapsed = t.elapsed();
        finish_pass(
            state,
            pass_id,
            diags,
            elapsed,
            verbose,
            &mut on_pass_complete,
        )?;

        if state.provenance.is_none() {
            if let (Some(spec), Some(catalog)) =
                (&state.artifacts.interface, &state.artifacts.catalog)
            {
                state.provenance = Some(compute_provenance(spec, catalog));
            }
        }
    }
    Ok(())
}

fn run_parse_ids(state: &mut CompilationState) -> Vec<Diagnostic> {
    let request = &state.request;
    let inputs = parse_id_list(request.inputs.as_deref(), IdListKind::Input);
    let outputs = parse_id_list(request.outputs.as_deref(), IdListKind::Output);

    let spec = InterfaceSpec::new(request.block_name.clone(), request.nickname.as_deref())
        .with_inputs(inputs.list.into_ids())
        .with_outputs(outputs.list.into_ids())
        .with_ticks_per_s(request.ticks_per_s);
    state.artifacts.interface = Some(spec);

    let mut diags = inputs.diagnostics;
    diags.extend(outputs.diagnostics);
    diags
}

fn run_load_catalog(state: &mut CompilationState) -> Vec<Diagnostic> {
    let loaded = match &state.request.catalog {
        CatalogSource::None => Ok(Catalog::new()),
        CatalogSource::File(path) => Catalog::load_dbc(path),
        CatalogSource::Text { origin, text } => Catalog::from_source(text, origin),
    };
    match loaded {
        Ok(catalog) => {
            state.artifacts.catalog = Some(catalog);
            Vec::new()
        }
        Err(err) => vec![catalog_diagnostic(&err)],
    }
}

fn run_build_schema(state: &mut CompilationState) -> Result<Vec<Diagnostic>, PipelineError> {
    let spec = upstream(state.artifacts.interface.as_ref(), PassId::BuildSchema)?;
    let catalog = upstream(state.artifacts.catalog.as_ref(), PassId::BuildSchema)?;
    let result = crate::schema::build_schema(spec, catalog);
    state.artifacts.schema = Some(result.schema);
    Ok(result.diagnostics)
}

fn run_synthesize(state: &mut CompilationState) -> Result<Vec<Diagnostic>, PipelineError> {
    let schema = upstream(state.artifacts.schema.as_ref(), PassId::Synthesize)?;
    let behavior = crate::behavior::synthesize(schema);

    let mut diags = Vec::new();
    let cert = crate::behavior::verify_behavior(&behavior, schema);
    if !cert.all_pass() {
        let failed: Vec<_> = cert
            .obligations()
            .iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect();
        diags.push(
            Diagnostic::error(format!(
                "behavior verification failed: {}",
                failed.join(", ")
            ))
            .with_code(codes::E0301),
        );
    }

    state.artifacts.model = Some(GeneratedBlockModel::new(schema.clone(), behavior));
    Ok(diags)
}

fn run_emit(state: &mut CompilationState) -> Result<Vec<Diagnostic>, PipelineError> {
    let model = upstream(state.artifacts.model.as_ref(), PassId::Emit)?;
    state.artifacts.generated = Some(crate::emit::emit(model));
    Ok(Vec::new())
}

// ── Tests ──────────────────────────────────────────────────────────────────
