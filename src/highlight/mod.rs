//! Syntax highlighting for fenced code blocks.
//!
//! Uses syntect with the bundled Sublime Text syntax definitions and emits
//! inline-styled HTML. Highlighting is optional: without the `codehilite`
//! feature [`highlight_html`] always returns `None` and the renderer falls
//! back to plain `<pre><code>` output.

use std::sync::{Mutex, OnceLock};

#[cfg(feature = "codehilite")]
use syntect::highlighting::{Theme, ThemeSet};
#[cfg(feature = "codehilite")]
use syntect::parsing::SyntaxSet;

/// Whether this build can highlight code at all.
pub const fn is_available() -> bool {
    cfg!(feature = "codehilite")
}

/// Highlight `code` as `language`, returning an HTML fragment.
///
/// Returns `None` when the language is missing or unknown, or when
/// syntect fails on the input.
#[cfg(feature = "codehilite")]
pub fn highlight_html(language: Option<&str>, code: &str) -> Option<String> {
    let language = language.map(str::trim).filter(|lang| !lang.is_empty())?;
    let syntax_set = syntax_set();
    let syntax = syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_name(language))?;

    let _scope = crate::perf::scope("highlight.html");
    match syntect::html::highlighted_html_for_string(code, syntax_set, syntax, theme()) {
        Ok(html) => Some(html),
        Err(err) => {
            tracing::debug!(language, %err, "highlighting failed, using plain code block");
            None
        }
    }
}

#[cfg(not(feature = "codehilite"))]
pub fn highlight_html(_language: Option<&str>, _code: &str) -> Option<String> {
    None
}

#[cfg(feature = "codehilite")]
fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

#[cfg(feature = "codehilite")]
fn theme() -> &'static Theme {
    static THEME: OnceLock<Theme> = OnceLock::new();
    THEME.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        let theme_set = ThemeSet::load_defaults();
        let preferred = match background_mode() {
            BackgroundMode::Dark => ["base16-ocean.dark", "Solarized (dark)", "base16-eighties.dark"]
                .as_slice(),
            BackgroundMode::Light => {
                ["InspiredGitHub", "Solarized (light)", "base16-ocean.light"].as_slice()
            }
        };

        for name in preferred {
            if let Some(theme) = theme_set.themes.get(*name) {
                return theme.clone();
            }
        }

        theme_set
            .themes
            .values()
            .next()
            .cloned()
            .unwrap_or_default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackgroundMode {
    Dark,
    Light,
}

/// Explicit theme choice for highlighted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

static BACKGROUND_OVERRIDE: OnceLock<Mutex<Option<HighlightBackground>>> = OnceLock::new();

/// Force a light or dark theme. `None` goes back to `COLORFGBG` detection.
///
/// The theme is chosen once on first use, so this must run before any
/// code block is highlighted.
pub fn set_background_mode(mode: Option<HighlightBackground>) {
    let lock = BACKGROUND_OVERRIDE.get_or_init(|| Mutex::new(None));
    let mut guard = lock.lock().expect("highlight background lock");
    *guard = mode;
}

#[cfg_attr(not(feature = "codehilite"), allow(dead_code))]
fn background_mode() -> BackgroundMode {
    let lock = BACKGROUND_OVERRIDE.get_or_init(|| Mutex::new(None));
    if let Ok(guard) = lock.lock()
        && let Some(mode) = *guard
    {
        return match mode {
            HighlightBackground::Light => BackgroundMode::Light,
            HighlightBackground::Dark => BackgroundMode::Dark,
        };
    }
    background_mode_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
}

/// Parse the terminal's `COLORFGBG` (`fg;bg`). Defaults to light, the
/// usual background of an HTML preview.
fn background_mode_from_colorfgbg(colorfgbg: Option<&str>) -> BackgroundMode {
    let Some(value) = colorfgbg else {
        return BackgroundMode::Light;
    };
    let bg_str = value.rsplit(';').next().unwrap_or(value);
    let Ok(bg) = bg_str.parse::<u8>() else {
        return BackgroundMode::Light;
    };

    if bg >= 7 {
        BackgroundMode::Light
    } else {
        BackgroundMode::Dark
    }
}
