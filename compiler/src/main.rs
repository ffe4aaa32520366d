use clap::Parser;
use std::path::{Path, PathBuf};

use blockgen::pass::PassId;
use blockgen::pipeline::{run_pipeline, BlockRequest, CatalogSource, CompilationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum EmitStage {
    /// Write <out-dir>/<name>.h and <out-dir>/<name>.c
    All,
    /// Print the structural artifact
    Header,
    /// Print the behavioral artifact
    Source,
    /// Print the block model as JSON
    Model,
    /// Print build provenance as JSON
    BuildInfo,
}

impl EmitStage {
    fn terminal(self) -> PassId {
        match self {
            EmitStage::All | EmitStage::Header | EmitStage::Source => PassId::Emit,
            EmitStage::Model => PassId::Synthesize,
            EmitStage::BuildInfo => PassId::BuildSchema,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "blockgen",
    version,
    about = "Block Generator: compiles CAN database selections into tick-driven embedded C blocks",
    after_help = "The generated source includes the database codec `can/<nickname>.h` and links \
against `can/<nickname>.c`. blockgen does not generate that pair; produce it with \
a DBC code generator (e.g. `cantools generate_c_source`) from the same database."
)]
struct Cli {
    /// Block name, prefix of every generated symbol
    name: String,

    /// Short name prefixing the database codec symbols [default: lower-cased name]
    #[arg(short, long)]
    nickname: Option<String>,

    /// DBC database file
    #[arg(short, long)]
    dbc: Option<PathBuf>,

    /// Comma-separated frame ids the block transmits (decimal or 0x hex)
    #[arg(short, long)]
    inputs: Option<String>,

    /// Comma-separated frame ids the block decodes (decimal or 0x hex)
    #[arg(short, long)]
    outputs: Option<String>,

    /// Tick rate set by the generated init function
    #[arg(long, default_value_t = blockgen::model::DEFAULT_TICKS_PER_S)]
    ticks_per_s: u8,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::All)]
    emit: EmitStage,

    /// Directory for `--emit all`
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print compiler phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("blockgen: block  = {}", cli.name);
        if let Some(dbc) = &cli.dbc {
            eprintln!("blockgen: dbc    = {}", dbc.display());
        }
        eprintln!("blockgen: emit   = {:?}", cli.emit);
    }

    let request = BlockRequest {
        block_name: cli.name.clone(),
        nickname: cli.nickname.clone(),
        inputs: cli.inputs.clone(),
        outputs: cli.outputs.clone(),
        ticks_per_s: cli.ticks_per_s,
        catalog: match &cli.dbc {
            Some(path) => CatalogSource::File(path.clone()),
            None => CatalogSource::None,
        },
    };

    let mut state = CompilationState::new(request);
    let result = run_pipeline(&mut state, cli.emit.terminal(), cli.verbose, |_, diags| {
        for diag in diags {
            eprintln!("blockgen: {}", diag);
        }
    });
    if let Err(err) = result {
        let code = if err.failing_pass == PassId::LoadCatalog {
            2
        } else {
            1
        };
        std::process::exit(code);
    }

    if cli.verbose {
        if let Some(catalog) = &state.artifacts.catalog {
            eprintln!("blockgen: {} messages in catalog", catalog.len());
        }
    }

    match cli.emit {
        EmitStage::BuildInfo => match &state.provenance {
            Some(provenance) => print!("{}", provenance.to_json()),
            None => {
                eprintln!("blockgen: error: no provenance available");
                std::process::exit(1);
            }
        },
        EmitStage::Model => {
            if let Some(model) = &state.artifacts.model {
                println!("{}", model.to_json());
            }
        }
        EmitStage::Header => {
            if let Some(generated) = &state.artifacts.generated {
                print!("{}", generated.header);
            }
        }
        EmitStage::Source => {
            if let Some(generated) = &state.artifacts.generated {
                print!("{}", generated.source);
            }
        }
        EmitStage::All => {
            let Some(generated) = &state.artifacts.generated else {
                std::process::exit(1);
            };
            let files = [
                (generated.header_name.as_str(), generated.header.as_str()),
                (generated.source_name.as_str(), generated.source.as_str()),
            ];
            match write_all(&cli.out_dir, &files) {
                Ok(written) => {
                    if cli.verbose {
                        for path in &written {
                            eprintln!("blockgen: wrote {}", path.display());
                        }
                        if let Some(model) = &state.artifacts.model {
                            eprintln!(
                                "blockgen: note: codec {} and its source are not generated by blockgen",
                                model.codec_header()
                            );
                        }
                    }
                }
                Err((path, e)) => {
                    eprintln!("blockgen: error: {}: {}", path.display(), e);
                    std::process::exit(2);
                }
            }
        }
    }
}

/// Write every artifact or none. Each file is staged as `<file>.tmp` in
/// `dir` and renamed into place once all are staged; on failure, staged
/// files and files already renamed are removed.
fn write_all(dir: &Path, files: &[(&str, &str)]) -> Result<Vec<PathBuf>, (PathBuf, std::io::Error)> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(files.len());
    for &(name, text) in files {
        let tmp = dir.join(format!("{}.tmp", name));
        if let Err(e) = std::fs::write(&tmp, text) {
            for (t, _) in &staged {
                let _ = std::fs::remove_file(t);
            }
            return Err((tmp, e));
        }
        staged.push((tmp, dir.join(name)));
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (i, (tmp, path)) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(tmp, path) {
            for p in &written {
                let _ = std::fs::remove_file(p);
            }
            for (t, _) in &staged[i..] {
                let _ = std::fs::remove_file(t);
            }
            return Err((path.clone(), e));
        }
        written.push(path.clone());
    }
    Ok(written)
}
