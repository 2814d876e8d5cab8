//! filescope - discover, classify and live-track a project's text files.
//!
//! Usage:
//!   filescope scan [PATH]          Scan and summarize
//!   filescope watch [PATH]         Scan, then stream changes until Ctrl-C
//!   filescope meta FILE            Show one freshly read entry
//!   filescope patterns show        Show the ignore pattern tiers
//!   filescope --help               Show help

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail, eyre};
use itertools::Itertools;
use tracing_subscriber::EnvFilter;

use filescope_core::{EngineConfig, FileEntry};
use filescope_engine::{EngineEvent, IndexingEngine, ScanStatus, ScanUpdate};
use filescope_ignore::{PatternResolver, PatternScope, ResolverConfig};
use filescope_scan::DirectoryScanner;
use filescope_watch::PollingWatcher;

#[derive(Parser)]
#[command(
    name = "filescope",
    version,
    about = "Discover, classify and live-track the text files of a project",
    long_about = "filescope walks a project root, applies layered ignore patterns \
                  (system, global and per-project .repo_ignore), classifies every \
                  file as text, binary or skipped, and can keep the listing current \
                  as files change."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use this global pattern file instead of the per-user one
    #[arg(long, global = true, value_name = "FILE")]
    global_patterns: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory and show a summary
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print every entry as JSON
        #[arg(long)]
        json: bool,

        /// Keep file contents in the JSON output
        #[arg(long)]
        include_content: bool,

        /// Number of largest files to list
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Scan a directory, then print changes until interrupted
    Watch {
        /// Directory to watch
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Poll instead of using OS notifications
        #[arg(long)]
        polling: bool,
    },

    /// Show a freshly read entry for one file
    Meta {
        /// File to inspect
        file: PathBuf,

        /// Root used to evaluate ignore patterns (defaults to the file's directory)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Inspect or edit ignore patterns
    Patterns {
        #[command(subcommand)]
        action: PatternsAction,
    },
}

#[derive(Subcommand)]
enum PatternsAction {
    /// Show system, global and local patterns
    Show {
        /// Project root whose local patterns to show
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Enable or disable one system pattern
    Toggle {
        /// System pattern, exactly as listed by `patterns show`
        pattern: String,
    },

    /// Replace a tier's patterns with the contents of a file or stdin
    Save {
        #[arg(value_enum)]
        scope: Scope,

        /// Project root (required for the local tier)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Read patterns from this file instead of stdin
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Delete a tier's pattern file
    Reset {
        #[arg(value_enum)]
        scope: Scope,

        /// Project root (required for the local tier)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scope {
    Global,
    Local,
}

impl From<Scope> for PatternScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Global => PatternScope::Global,
            Scope::Local => PatternScope::Local,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut resolver_config = ResolverConfig::default();
    if let Some(path) = cli.global_patterns {
        resolver_config = resolver_config.with_global_path(path);
    }
    let resolver = Arc::new(PatternResolver::new(resolver_config));

    match cli.command {
        Command::Scan {
            path,
            json,
            include_content,
            top,
        } => run_scan(resolver, &path, json, include_content, top).await?,
        Command::Watch { path, polling } => run_watch(resolver, &path, polling).await?,
        Command::Meta { file, root } => run_meta(resolver, &file, root.as_deref())?,
        Command::Patterns { action } => run_patterns(&resolver, action)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Drain an update stream, echoing progress, and return the file list.
async fn collect_files(mut updates: tokio::sync::mpsc::Receiver<ScanUpdate>) -> Result<Vec<FileEntry>> {
    while let Some(update) = updates.recv().await {
        match update.status {
            ScanStatus::Processing => {
                if let Some(progress) = update.progress {
                    eprint!(
                        "\r{} files, {} directories...",
                        progress.files_scanned, progress.dirs_scanned
                    );
                }
            }
            ScanStatus::Complete => {
                eprint!("\r");
                return Ok(update.files.unwrap_or_default());
            }
            ScanStatus::Error => bail!(update.message),
            ScanStatus::Cancelled => bail!("Scan cancelled"),
        }
    }
    Err(eyre!("Scan ended without a result"))
}

/// Scan once and print a summary or JSON.
async fn run_scan(
    resolver: Arc<PatternResolver>,
    path: &Path,
    json: bool,
    include_content: bool,
    top_n: usize,
) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;

    let mut config = EngineConfig {
        watch_after_scan: false,
        ..EngineConfig::default()
    };
    config.scan.include_content = include_content;
    let engine = IndexingEngine::new(config, resolver);

    eprintln!("Scanning {}...", path.display());
    let files = collect_files(engine.request_file_list(&path, false)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    print_summary(&path, &files, top_n);
    Ok(())
}

fn print_summary(root: &Path, files: &[FileEntry], top_n: usize) {
    let included = files.iter().filter(|f| f.is_included()).collect_vec();
    let excluded = files.iter().filter(|f| f.excluded_by_default).count();
    let binary = files.iter().filter(|f| f.is_binary).count();
    let skipped = files.iter().filter(|f| f.is_skipped && !f.is_binary).count();
    let total_size: u64 = included.iter().map(|f| f.size).sum();
    let total_tokens: u64 = included.iter().map(|f| u64::from(f.token_count)).sum();

    if let Some(sentinel) = files.iter().find(|f| f.is_app_directory) {
        println!("{} is the application directory; not scanned.", sentinel.path);
        return;
    }

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", root.display(), format_size(total_size));
    println!(
        " {} included, {} excluded, {} binary, {} skipped",
        included.len(),
        excluded,
        binary,
        skipped
    );
    println!(" ~{} tokens", total_tokens);
    println!("{}", "─".repeat(60));

    let root_prefix = filescope_core::normalize_path(root);
    for file in included
        .iter()
        .sorted_by(|a, b| b.token_count.cmp(&a.token_count).then(a.path.cmp(&b.path)))
        .take(top_n)
    {
        let display = filescope_core::relative_path(&root_prefix, &file.path).unwrap_or(&file.path);
        println!(
            " {:>10} {:>8} tok  {}",
            format_size(file.size),
            file.token_count,
            truncate(display, 60)
        );
    }
}

/// Scan, arm the watcher and print events until Ctrl-C.
async fn run_watch(resolver: Arc<PatternResolver>, path: &Path, polling: bool) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let config = EngineConfig::default();

    let engine = if polling {
        let backend = Arc::new(PollingWatcher::new(&config.watch));
        IndexingEngine::with_watcher(config, resolver, backend)
    } else {
        IndexingEngine::new(config, resolver)
    };
    let mut events = engine.subscribe();

    eprintln!("Scanning {}...", path.display());
    let files = collect_files(engine.request_file_list(&path, false)).await?;
    let included = files.iter().filter(|f| f.is_included()).count();
    eprintln!("{} files ({} included). Watching for changes, Ctrl-C to stop.", files.len(), included);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(EngineEvent::FileChanged(change)) => {
                    println!("{:<6} {}", change.kind, change.path);
                }
                Ok(EngineEvent::WatcherWarning { message }) => {
                    eprintln!("warning: {message}");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("warning: {missed} events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    engine.stop_watching().await;
    eprintln!(
        "{} files tracked at exit.",
        engine.active_files().iter().filter(|f| f.is_included()).count()
    );
    Ok(())
}

/// Print one refreshed entry as JSON.
fn run_meta(resolver: Arc<PatternResolver>, file: &Path, root: Option<&Path>) -> Result<()> {
    let file = file.canonicalize().context("Invalid file")?;
    let root = match root {
        Some(root) => root.canonicalize().context("Invalid root")?,
        None => file
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| eyre!("{} has no parent directory", file.display()))?,
    };

    let scanner = DirectoryScanner::new(Default::default(), resolver);
    let mut entry = scanner
        .file_entry(&root, &file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    entry.content = None;

    println!("{}", serde_json::to_string_pretty(&entry)?);
    Ok(())
}

fn run_patterns(resolver: &PatternResolver, action: PatternsAction) -> Result<()> {
    match action {
        PatternsAction::Show { root } => {
            let disabled = resolver.disabled_system_patterns();
            println!("System patterns:");
            for pattern in resolver.system_patterns() {
                let mark = if disabled.contains(pattern) { " " } else { "x" };
                println!("  [{mark}] {pattern}");
            }

            let global = resolver
                .load_patterns(PatternScope::Global, None)
                .context("Failed to load global patterns")?;
            match resolver.global_path() {
                Some(path) => println!("\nGlobal patterns ({}):", path.display()),
                None => println!("\nGlobal patterns:"),
            }
            print_user_text(&global.user_text);

            if let Some(root) = root {
                let local = resolver
                    .load_patterns(PatternScope::Local, Some(&root))
                    .context("Failed to load local patterns")?;
                println!(
                    "\nLocal patterns ({}):",
                    PatternResolver::local_path(&root).display()
                );
                print_user_text(&local.user_text);
            }
        }
        PatternsAction::Toggle { pattern } => {
            let disabled = resolver
                .toggle_system_pattern(&pattern)
                .context("Failed to toggle pattern")?;
            let state = if disabled.contains(&pattern) {
                "disabled"
            } else {
                "enabled"
            };
            println!("{pattern} {state}");
        }
        PatternsAction::Save { scope, root, file } => {
            let text = match file {
                Some(file) => std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin().read_to_string(&mut text)?;
                    text
                }
            };
            resolver
                .save_patterns(scope.into(), root.as_deref(), &text)
                .context("Failed to save patterns")?;
            eprintln!("Saved {} patterns", PatternScope::from(scope));
        }
        PatternsAction::Reset { scope, root } => {
            resolver
                .reset_patterns(scope.into(), root.as_deref())
                .context("Failed to reset patterns")?;
            eprintln!("Reset {} patterns", PatternScope::from(scope));
        }
    }
    Ok(())
}

fn print_user_text(text: &str) {
    if text.trim().is_empty() {
        println!("  (none)");
        return;
    }
    for line in text.lines() {
        println!("  {line}");
    }
}

/// Format a byte size for display.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string from the left, keeping the end visible.
fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - max_len + 3).collect();
        format!("...{tail}")
    }
}
