//! Compositor
//!
//! Command-line front end over a YAML snapshot of the type stores.
//!
//! Usage:
//!   compositor --snapshot types.yml compositions --kind document --id 4
//!   compositor save --kind document --request article.json

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use compositor_kernel::config::Config;
use compositor_kernel::mapping::to_entity_basic;
use compositor_kernel::models::{ContentTypeKind, ContentTypeSave, MoveOrCopy};
use compositor_kernel::store::{ContentTypeStore, InMemoryTypeStore, snapshot};
use compositor_kernel::validation::EditorValidatorRegistry;
use compositor_kernel::{ContentTypeEditor, KernelError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML snapshot to read and update (overrides COMPOSITOR_SNAPSHOT).
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the types of one kind.
    List {
        #[arg(long)]
        kind: ContentTypeKind,
    },

    /// Show which types may be composed into a type.
    Compositions {
        #[arg(long)]
        kind: ContentTypeKind,

        /// Type id; 0 evaluates a type that is not saved yet.
        #[arg(long, default_value = "0")]
        id: i32,

        /// Type alias to treat as unavailable (repeatable).
        #[arg(long = "exclude-type")]
        exclude_types: Vec<String>,

        /// Property alias to treat as taken (repeatable).
        #[arg(long = "exclude-property")]
        exclude_properties: Vec<String>,

        /// Evaluate for an element type.
        #[arg(long)]
        element: bool,
    },

    /// Show which types are composed of a type.
    UsedBy {
        #[arg(long)]
        kind: ContentTypeKind,

        #[arg(long)]
        id: i32,
    },

    /// Create or update a type from a JSON save request.
    Save {
        #[arg(long)]
        kind: ContentTypeKind,

        #[arg(long)]
        request: PathBuf,
    },

    /// Move a type beneath another folder or type.
    Move {
        #[arg(long)]
        kind: ContentTypeKind,

        #[arg(long)]
        id: i32,

        /// Target parent id; -1 is the root.
        #[arg(long, allow_hyphen_values = true)]
        parent: i32,
    },

    /// Copy a type beneath another folder or type.
    Copy {
        #[arg(long)]
        kind: ContentTypeKind,

        #[arg(long)]
        id: i32,

        /// Target parent id; -1 is the root.
        #[arg(long, allow_hyphen_values = true)]
        parent: i32,
    },
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.snapshot {
        config.snapshot_path = path;
    }

    let stores = snapshot::load(&config.snapshot_path)?;
    let texts = config.load_texts()?;
    let validators = EditorValidatorRegistry::with_defaults(&texts);
    let editor = ContentTypeEditor::new(stores)
        .with_dictionary(config.load_dictionary()?)
        .with_texts(Arc::new(texts))
        .with_validators(validators);

    if run(&editor, cli.command)? {
        snapshot::save(editor.stores(), &config.snapshot_path)?;
    }
    Ok(())
}

/// Execute one command. Returns whether the stores changed.
fn run(editor: &ContentTypeEditor<InMemoryTypeStore>, command: Command) -> Result<bool> {
    match command {
        Command::List { kind } => {
            let types = editor.stores().for_kind(kind).get_all()?;
            let entities: Vec<_> = types.iter().map(to_entity_basic).collect();
            print_json(&entities)?;
            Ok(false)
        }
        Command::Compositions {
            kind,
            id,
            exclude_types,
            exclude_properties,
            element,
        } => {
            let choices = editor.available_compositions(
                id,
                kind,
                &exclude_types,
                &exclude_properties,
                element,
            )?;
            print_json(&choices)?;
            Ok(false)
        }
        Command::UsedBy { kind, id } => {
            print_json(&editor.used_by(id, kind)?)?;
            Ok(false)
        }
        Command::Save { kind, request } => {
            let text = std::fs::read_to_string(&request)
                .with_context(|| format!("failed to read {}", request.display()))?;
            let request: ContentTypeSave = serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", request.display()))?;
            match editor.save(kind, request) {
                Ok(saved) => {
                    info!(id = saved.id, alias = %saved.alias, "saved");
                    print_json(&saved)?;
                    Ok(true)
                }
                Err(KernelError::Validation(failure)) => {
                    print_json(&failure.display.errors)?;
                    bail!("save rejected: {failure}");
                }
                Err(err) => Err(err.into()),
            }
        }
        Command::Move { kind, id, parent } => {
            let path = editor.move_type(kind, MoveOrCopy { id, parent_id: parent })?;
            println!("{path}");
            Ok(true)
        }
        Command::Copy { kind, id, parent } => {
            let path = editor.copy_type(kind, MoveOrCopy { id, parent_id: parent })?;
            println!("{path}");
            Ok(true)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}

/// Initialize tracing with environment filter. Logs go to stderr so
/// stdout stays machine-readable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
