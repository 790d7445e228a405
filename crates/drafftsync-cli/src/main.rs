//! Offline tooling for persisted DrafftSync scenes.
//!
//! ```text
//! drafftsync merge local.json remote.json --output merged.json
//! drafftsync inspect scene.json
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use drafftsync_core::{ElementId, ReconcileOptions, ReconcileStats, SceneDocument, reconcile_with};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("{path} is not a scene document: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Stdout(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "drafftsync", version, about = "Merge and inspect persisted DrafftSync scenes")]
struct Cli {
    /// Emit single-line JSON instead of pretty-printed output.
    #[arg(long, global = true, env = "DRAFFTSYNC_COMPACT", default_value_t = false)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile a remote scene into a local one.
    Merge {
        local: PathBuf,
        remote: PathBuf,
        /// Write the merged document here instead of stdout.
        #[arg(long, short, env = "DRAFFTSYNC_OUTPUT")]
        output: Option<PathBuf>,
        /// Keep the local copy of these elements whatever the remote version.
        #[arg(long = "protect", value_name = "ID")]
        protected: Vec<String>,
    },
    /// Summarise a scene: element counts by kind, tombstones, scene version.
    Inspect { file: PathBuf },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Merge {
            local,
            remote,
            output,
            protected,
        } => {
            let local_doc = load(&local)?;
            let remote_doc = load(&remote)?;
            let (merged, stats) = merge(local_doc, &remote_doc, protected);
            eprintln!(
                "merged {}: {} inserted, {} replaced, {} kept local, {} unchanged",
                remote.display(),
                stats.inserted,
                stats.replaced,
                stats.kept_local,
                stats.unchanged
            );
            let text = render(&merged, cli.compact)?;
            match output {
                Some(path) => fs::write(&path, text).map_err(|source| CliError::Write { path, source }),
                None => print_line(&text),
            }
        }
        Command::Inspect { file } => {
            let doc = load(&file)?;
            print_line(&render(&inspect(&doc), cli.compact)?)
        }
    }
}

fn load(path: &Path) -> Result<SceneDocument, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = SceneDocument::from_json(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    log::debug!("loaded {} ({} elements)", path.display(), doc.elements.len());
    Ok(doc)
}

/// The local document with the remote elements reconciled into it.
fn merge(mut local: SceneDocument, remote: &SceneDocument, protected: Vec<String>) -> (SceneDocument, ReconcileStats) {
    let options = ReconcileOptions {
        protected: protected.into_iter().map(ElementId::from).collect(),
    };
    let result = reconcile_with(&local.elements, &remote.elements, &options);
    local.elements = result.elements;
    (local, result.stats)
}

fn inspect(doc: &SceneDocument) -> serde_json::Value {
    let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
    let mut deleted = 0;
    for el in &doc.elements {
        if el.is_deleted {
            deleted += 1;
        } else {
            *kinds.entry(el.kind.name()).or_default() += 1;
        }
    }
    let max_version = doc.elements.iter().map(|el| el.version).max().unwrap_or(0);

    json!({
        "id": doc.id,
        "name": doc.name,
        "elements": doc.elements.len(),
        "visible": doc.elements.len() - deleted,
        "deleted": deleted,
        "kinds": kinds,
        "sceneVersion": drafftsync_core::version::scene_version(&doc.elements),
        "maxElementVersion": max_version,
    })
}

fn render<T: serde::Serialize>(value: &T, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(text)
}

fn print_line(text: &str) -> Result<(), CliError> {
    let mut out = io::stdout().lock();
    writeln!(out, "{text}")?;
    Ok(())
}
