//! Livemark - live markdown preview from the command line.
//!
//! # Usage
//!
//! ```bash
//! livemark README.md > preview.html
//! livemark --watch --output preview.html README.md
//! livemark --replace-all teh the --write README.md
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use livemark::app::App;
use livemark::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use livemark::highlight::{HighlightBackground, set_background_mode};
use livemark::perf;
use livemark::render::{Extension, ExtensionSet};
use livemark::session::{DEFAULT_SESSION_FILE, SessionStore};

/// Live markdown preview with session restore
#[derive(Parser, Debug)]
#[command(name = "livemark", version, about, long_about = None)]
struct Cli {
    /// Markdown file to open when there is no session to restore
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Write the HTML preview here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Replace every occurrence of FIND with REPLACE before rendering
    #[arg(long, num_args = 2, value_names = ["FIND", "REPLACE"])]
    replace_all: Option<Vec<String>>,

    /// Save the document back to its file after replacing
    #[arg(long)]
    write: bool,

    /// Watch the file and re-render on external changes
    #[arg(short, long)]
    watch: bool,

    /// Render code blocks without syntax highlighting
    #[arg(long)]
    no_highlight: bool,

    /// Output a bare HTML fragment instead of a styled page
    #[arg(long)]
    no_stylesheet: bool,

    /// Disable a markdown extension (fenced_code, tables, toc, abbr, attr_list, codehilite)
    #[arg(long, value_name = "NAME")]
    disable_extension: Vec<String>,

    /// Quiet time in milliseconds before the preview re-renders
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Session file location
    #[arg(long, value_name = "PATH")]
    session: Option<PathBuf>,

    /// Force syntax highlight theme background (light or dark)
    #[arg(long, value_enum, default_value = "auto")]
    theme: ThemeMode,

    /// Enable performance logging
    #[arg(long)]
    perf: bool,

    /// Write detailed render debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn extensions_for(flags: &ConfigFlags) -> ExtensionSet {
    let mut extensions = ExtensionSet::standard();
    for ext in &flags.disabled_extensions {
        extensions = extensions.without(*ext);
    }
    if flags.no_highlight {
        extensions = extensions.without(Extension::CodeHilite);
    }
    extensions
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    for name in &cli.disable_extension {
        if Extension::from_name(name).is_none() {
            anyhow::bail!("Unknown extension: {name}");
        }
    }

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("LIVEMARK_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        tracing::warn!(
            path = ?render_debug_log_path,
            %err,
            "failed to initialize render debug log"
        );
    }

    match effective.theme.unwrap_or(ThemeMode::Auto) {
        ThemeMode::Auto => set_background_mode(None),
        ThemeMode::Light => set_background_mode(Some(HighlightBackground::Light)),
        ThemeMode::Dark => set_background_mode(Some(HighlightBackground::Dark)),
    }

    let session_path = effective
        .session
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE));

    let mut app = App::new(cli.file)
        .with_session(SessionStore::new(session_path))
        .with_watch(effective.watch)
        .with_extensions(extensions_for(&effective))
        .with_stylesheet(!effective.no_stylesheet)
        .with_output(cli.output)
        .with_write(cli.write);
    if let Some(ms) = effective.debounce_ms {
        app = app.with_quiet_period(Duration::from_millis(ms));
    }
    if let Some([find, replace]) = cli.replace_all.as_deref() {
        app = app.with_replace_all(find.clone(), replace.clone());
    }

    let result = app.run().context("Application error");
    let _ = perf::set_debug_log_path(None);
    result
}
