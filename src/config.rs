//! Persistent default flags.
//!
//! Defaults live in plain text files holding the same `--flags` the CLI
//! accepts, one or more per line, `#` starting a comment. A global file
//! is merged with a local `.livemarkrc`, and the command line wins over
//! both.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::render::Extension;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub no_highlight: bool,
    pub no_stylesheet: bool,
    pub perf: bool,
    pub debounce_ms: Option<u64>,
    pub session: Option<PathBuf>,
    pub theme: Option<ThemeMode>,
    pub render_debug_log: Option<PathBuf>,
    pub disabled_extensions: Vec<Extension>,
}

impl ConfigFlags {
    /// Merge two flag sets. Booleans are OR-ed; for valued options `other`
    /// wins when it sets one.
    pub fn union(&self, other: &Self) -> Self {
        let mut disabled_extensions = self.disabled_extensions.clone();
        for ext in &other.disabled_extensions {
            if !disabled_extensions.contains(ext) {
                disabled_extensions.push(*ext);
            }
        }
        Self {
            watch: self.watch || other.watch,
            no_highlight: self.no_highlight || other.no_highlight,
            no_stylesheet: self.no_stylesheet || other.no_stylesheet,
            perf: self.perf || other.perf,
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
            session: other.session.clone().or_else(|| self.session.clone()),
            theme: other.theme.or(self.theme),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
            disabled_extensions,
        }
    }

    fn to_lines(&self) -> Vec<String> {
        let mut lines = vec!["# livemark defaults (saved with --save)".to_string()];
        for (set, flag) in [
            (self.watch, "--watch"),
            (self.no_highlight, "--no-highlight"),
            (self.no_stylesheet, "--no-stylesheet"),
            (self.perf, "--perf"),
        ] {
            if set {
                lines.push(flag.to_string());
            }
        }
        if let Some(ms) = self.debounce_ms {
            lines.push(format!("--debounce-ms {ms}"));
        }
        if let Some(path) = &self.session {
            lines.push(format!("--session {}", path.display()));
        }
        if let Some(theme) = self.theme {
            lines.push(format!("--theme {}", theme.as_str()));
        }
        if let Some(path) = &self.render_debug_log {
            lines.push(format!("--render-debug-log {}", path.display()));
        }
        for ext in &self.disabled_extensions {
            lines.push(format!("--disable-extension {}", ext.name()));
        }
        lines
    }
}

/// Platform location of the global defaults file.
pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("livemark").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("livemark")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("livemark").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("livemark")
                .join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".livemarkrc")
}

/// Read flags from `path`. A missing file yields the defaults.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", flags.to_lines().join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the flags livemark knows out of a token list. Unknown tokens and
/// malformed values are skipped.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (token, None),
        };

        match name {
            "--watch" => flags.watch = true,
            "--no-highlight" => flags.no_highlight = true,
            "--no-stylesheet" => flags.no_stylesheet = true,
            "--perf" => flags.perf = true,
            "--debounce-ms" | "--session" | "--theme" | "--render-debug-log"
            | "--disable-extension" => {
                let value = match inline_value {
                    Some(value) => Some(value),
                    None => {
                        let next = tokens.get(i + 1).map(String::as_str);
                        if next.is_some() {
                            i += 1;
                        }
                        next
                    }
                };
                if let Some(value) = value {
                    apply_valued_flag(&mut flags, name, value);
                }
            }
            _ => {}
        }
        i += 1;
    }
    flags
}

fn apply_valued_flag(flags: &mut ConfigFlags, name: &str, value: &str) {
    match name {
        "--debounce-ms" => {
            if let Ok(ms) = value.parse() {
                flags.debounce_ms = Some(ms);
            }
        }
        "--session" => flags.session = Some(PathBuf::from(value)),
        "--theme" => flags.theme = ThemeMode::parse(value),
        "--render-debug-log" => flags.render_debug_log = Some(PathBuf::from(value)),
        "--disable-extension" => {
            if let Some(ext) = Extension::from_name(value)
                && !flags.disabled_extensions.contains(&ext)
            {
                flags.disabled_extensions.push(ext);
            }
        }
        _ => {}
    }
}
