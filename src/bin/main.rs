use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use editlens::breakpoints::parse_breakpoints;
use editlens::config::{Settings, SettingsEventKind, SettingsStore, load_settings};
use editlens::error::{LensError, LensResult};
use editlens::json::JsonEscapeAssistant;
use editlens::markdown::{MarkdownDocumentController, parse_code_blocks};
use editlens::projection::ProjectionLocation;
use editlens::{DiskFileStore, DocumentStore, VirtualFileSystem};
use tower_lsp_server::ls_types::Position;
use url::Url;

/// Inspect the projections and helpers editlens derives from a file
#[derive(Parser)]
#[command(name = "editlens")]
#[command(version)]
#[command(about = "Inspect the projections and helpers editlens derives from a file")]
struct Cli {
    /// Workspace root holding editlens.toml (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the fenced code blocks of a markdown file
    Blocks {
        file: PathBuf,
    },
    /// Write every code block of a markdown file into its projection directory
    Project {
        file: PathBuf,
    },
    /// Show the path and unescaped value of the JSON string at a position
    JsonString {
        file: PathBuf,

        /// Zero-based line
        #[arg(long)]
        line: u32,

        /// Zero-based UTF-16 column
        #[arg(long)]
        character: u32,
    },
    /// Parse breakpoint editor text against a target file
    Breakpoints {
        file: PathBuf,

        /// File the breakpoints belong to
        #[arg(long)]
        target: PathBuf,
    },
    /// Print the effective settings as TOML
    Settings,
}

fn settings(root: Option<&Path>) -> Settings {
    let outcome = load_settings(root, None);
    for event in outcome.events {
        match event.kind {
            SettingsEventKind::Info => log::info!(target: "editlens::config", "{}", event.message),
            SettingsEventKind::Warning => {
                log::warn!(target: "editlens::config", "{}", event.message)
            }
        }
    }
    outcome.settings
}

fn file_url(path: &Path) -> LensResult<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute)
        .map_err(|()| LensError::config(format!("{} is not a valid file path", path.display())))
}

async fn run(cli: Cli) -> LensResult<()> {
    let root = cli.root.or_else(|| std::env::current_dir().ok());
    let settings = settings(root.as_deref());

    match cli.command {
        Commands::Blocks { file } => {
            let uri = file_url(&file)?;
            let text = tokio::fs::read_to_string(&file).await?;
            for block in parse_code_blocks(&text) {
                let location = ProjectionLocation::new(
                    &uri,
                    &settings.markdown_projection.directory,
                    &block.key(),
                    &settings.virtual_file_scheme,
                )?;
                println!(
                    "{}\t{}\t{}\tlines {}-{}\t{}",
                    block.id,
                    block.language,
                    block.extension.as_deref().unwrap_or("-"),
                    block.content_range.start.line + 1,
                    block.content_range.end.line + 1,
                    location.file
                );
            }
        }
        Commands::Project { file } => {
            let uri = file_url(&file)?;
            let text = tokio::fs::read_to_string(&file).await?;
            let mut controller = MarkdownDocumentController::new(
                uri,
                Arc::new(DiskFileStore),
                &settings.markdown_projection,
                settings.virtual_file_scheme.clone(),
            );
            controller.process_content(&text).await?;
            for target in controller.targets() {
                println!("{}", target.uri());
            }
        }
        Commands::JsonString {
            file,
            line,
            character,
        } => {
            let uri = file_url(&file)?;
            let text = tokio::fs::read_to_string(&file).await?;
            let store = Arc::new(DocumentStore::new());
            store.open(uri.clone(), text, Some("json".to_string()));
            let vfs = Arc::new(VirtualFileSystem::new(settings.virtual_file_scheme.clone()));
            let assistant =
                JsonEscapeAssistant::new(store, vfs, Arc::new(SettingsStore::new(settings)));
            match assistant.string_at(&uri, Position::new(line, character))? {
                Some(info) => {
                    println!("path: {}", info.path);
                    println!("{}", info.value);
                }
                None => {
                    eprintln!("No string literal at {}:{}", line, character);
                    std::process::exit(1);
                }
            }
        }
        Commands::Breakpoints { file, target } => {
            let text = tokio::fs::read_to_string(&file).await?;
            let target_text = tokio::fs::read_to_string(&target).await?;
            let target_uri = file_url(&target)?;
            let line_count = target_text.split('\n').count();
            for breakpoint in parse_breakpoints(&text, &target_uri, line_count) {
                println!(
                    "{}:{}\tlog={}\tcondition={}",
                    breakpoint.uri,
                    breakpoint.line + 1,
                    breakpoint.log_message.as_deref().unwrap_or("-"),
                    breakpoint.condition.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Settings => {
            let rendered = toml::to_string(&settings)
                .map_err(|err| LensError::internal(format!("failed to render settings: {err}")))?;
            print!("{rendered}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
