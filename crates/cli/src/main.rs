mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ctlplane_lib::consts::{STORE_ENV, TEMPLATES_ENV};
use ctlplane_lib::parent::ParentKey;
use ctlplane_lib::paths;

use cmd::ParentKind;
use output::OutputFormat;

/// ctlplane - declarative control plane reconciler
#[derive(Parser)]
#[command(name = "ctlplane")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Resource store directory
  #[arg(long, global = true, env = STORE_ENV)]
  store: Option<PathBuf>,

  /// Directory holding one template directory per component
  #[arg(long, global = true, env = TEMPLATES_ENV)]
  templates: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short = 'o', long, global = true, value_enum, default_value = "text")]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create or update parent objects from a YAML or JSON file
  Submit {
    /// File holding one or more `---`-separated parent documents
    file: PathBuf,
  },

  /// Reconcile one parent against the store
  Reconcile {
    /// Parent to reconcile, as <namespace>/<name>
    key: ParentKey,

    /// Kind of the parent
    #[arg(short, long, value_enum, default_value = "controlplane")]
    kind: ParentKind,

    /// Attempts to make after a retryable failure
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Delay before the first retry; doubled on each attempt (e.g. "200ms", "1s")
    #[arg(long, value_parser = humantime::parse_duration, default_value = "200ms")]
    backoff: Duration,
  },

  /// Show the tagged manifests a parent document renders to, without applying them
  Render {
    /// File holding the parent document
    file: PathBuf,
  },

  /// List the objects owned by a parent
  Children {
    /// Parent, as <namespace>/<name>
    key: ParentKey,

    /// Kind of the parent
    #[arg(short, long, value_enum, default_value = "controlplane")]
    kind: ParentKind,
  },

  /// Delete a parent object; its children are left for `gc`
  Delete {
    /// Parent, as <namespace>/<name>
    key: ParentKey,

    /// Kind of the parent
    #[arg(short, long, value_enum, default_value = "controlplane")]
    kind: ParentKind,
  },

  /// Delete objects whose owner no longer exists
  Gc {
    /// Report what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,
  },
}

/// Locations resolved from flags, then environment, then defaults.
pub struct GlobalPaths {
  pub store: PathBuf,
  pub templates: PathBuf,
}

impl GlobalPaths {
  fn resolve(store: Option<PathBuf>, templates: Option<PathBuf>) -> Self {
    Self {
      store: store.unwrap_or_else(paths::store_dir),
      templates: templates.unwrap_or_else(paths::templates_dir),
    }
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let paths = GlobalPaths::resolve(cli.store, cli.templates);
  let output = cli.output;

  match cli.command {
    Commands::Submit { file } => cmd::cmd_submit(&file, &paths, output),
    Commands::Reconcile {
      key,
      kind,
      retries,
      backoff,
    } => cmd::cmd_reconcile(&key, kind, retries, backoff, &paths, output),
    Commands::Render { file } => cmd::cmd_render(&file, &paths, output),
    Commands::Children { key, kind } => cmd::cmd_children(&key, kind, &paths, output),
    Commands::Delete { key, kind } => cmd::cmd_delete(&key, kind, &paths, output),
    Commands::Gc { dry_run } => cmd::cmd_gc(dry_run, &paths, output),
  }
}
