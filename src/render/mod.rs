//! Markdown to HTML conversion.
//!
//! The conversion itself is a capability behind [`MarkdownCapability`] so
//! hosts and tests can substitute their own converter. [`ComrakRenderer`]
//! is the production implementation: comrak parses the document and the
//! passes in [`extensions`] add table-of-contents, abbreviation, attribute
//! list and code highlighting support on top of the parsed tree.

mod extensions;
mod stylesheet;

use std::fmt;

use comrak::{Arena, Options, parse_document};
use thiserror::Error;

pub(crate) use extensions::escape_html;
pub use stylesheet::{STYLESHEET, wrap_with_stylesheet};

/// Optional features of the markdown dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// ```` ``` ```` fenced code blocks with a language tag.
    FencedCode,
    /// Pipe tables.
    Tables,
    /// `[TOC]` placeholder and heading ids.
    Toc,
    /// `*[ABBR]: Expansion` definitions.
    Abbr,
    /// Trailing `{: #id .class key=value}` on headings and paragraphs.
    AttrList,
    /// Syntax highlighted code blocks. Needs the `codehilite` feature.
    CodeHilite,
}

impl Extension {
    pub const ALL: [Self; 6] = [
        Self::FencedCode,
        Self::Tables,
        Self::Toc,
        Self::Abbr,
        Self::AttrList,
        Self::CodeHilite,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::FencedCode => "fenced_code",
            Self::Tables => "tables",
            Self::Toc => "toc",
            Self::Abbr => "abbr",
            Self::AttrList => "attr_list",
            Self::CodeHilite => "codehilite",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ext| ext.name() == name)
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`Extension`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExtensionSet(u8);

impl ExtensionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every extension, including code highlighting.
    pub const fn standard() -> Self {
        let mut set = Self::empty();
        let mut i = 0;
        while i < Extension::ALL.len() {
            set = set.with(Extension::ALL[i]);
            i += 1;
        }
        set
    }

    pub const fn contains(self, extension: Extension) -> bool {
        self.0 & extension.bit() != 0
    }

    #[must_use]
    pub const fn with(self, extension: Extension) -> Self {
        Self(self.0 | extension.bit())
    }

    #[must_use]
    pub const fn without(self, extension: Extension) -> Self {
        Self(self.0 & !extension.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = Extension> {
        Extension::ALL
            .into_iter()
            .filter(move |ext| self.contains(*ext))
    }
}

impl fmt::Debug for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Extension::name)).finish()
    }
}

impl FromIterator<Extension> for ExtensionSet {
    fn from_iter<I: IntoIterator<Item = Extension>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// Errors from a markdown conversion.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write HTML: {0}")]
    Convert(#[from] std::io::Error),
    #[error("markdown converter failed: {0}")]
    Capability(String),
    #[error("markdown converter panicked")]
    Panicked,
}

/// Something that turns markdown into an HTML fragment.
///
/// Implementations must be pure: the same text and extensions always give
/// the same output.
pub trait MarkdownCapability {
    /// Convert `text` using `extensions`.
    ///
    /// # Errors
    /// Returns a [`RenderError`] when conversion fails.
    fn render(&self, text: &str, extensions: ExtensionSet) -> Result<String, RenderError>;
}

/// The comrak-backed converter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComrakRenderer;

impl ComrakRenderer {
    /// The extensions that will actually run for a requested set.
    ///
    /// Code highlighting is silently dropped when this build cannot do it.
    pub const fn effective_extensions(requested: ExtensionSet) -> ExtensionSet {
        if crate::highlight::is_available() {
            requested
        } else {
            requested.without(Extension::CodeHilite)
        }
    }
}

impl MarkdownCapability for ComrakRenderer {
    fn render(&self, text: &str, extensions: ExtensionSet) -> Result<String, RenderError> {
        let _scope = crate::perf::scope("render.comrak");
        let extensions = Self::effective_extensions(extensions);

        let source = if extensions.contains(Extension::Abbr) {
            extensions::strip_abbreviations(text)
        } else {
            extensions::Stripped {
                text: text.to_string(),
                abbreviations: Vec::new(),
            }
        };

        let arena = Arena::new();
        let mut options = Options::default();
        configure(&mut options, extensions);
        let root = parse_document(&arena, &source.text, &options);

        extensions::apply(root, &options, extensions, &source.abbreviations)?;

        let mut html = Vec::new();
        comrak::format_html(root, &options, &mut html)?;
        String::from_utf8(html).map_err(|err| RenderError::Capability(err.to_string()))
    }
}

fn configure(options: &mut Options, extensions: ExtensionSet) {
    options.extension.table = extensions.contains(Extension::Tables);
    // Extension passes splice finished HTML into the tree as raw blocks.
    options.render.unsafe_ = true;
}

/// Convert `text` with the standard extension set.
///
/// # Errors
/// Returns a [`RenderError`] when conversion fails.
pub fn render(text: &str) -> Result<String, RenderError> {
    ComrakRenderer.render(text, ExtensionSet::standard())
}

/// A converter plus the settings a host renders with.
pub struct RenderPipeline {
    capability: Box<dyn MarkdownCapability>,
    extensions: ExtensionSet,
    stylesheet: bool,
}

impl RenderPipeline {
    pub fn new(capability: Box<dyn MarkdownCapability>, extensions: ExtensionSet) -> Self {
        Self {
            capability,
            extensions,
            stylesheet: true,
        }
    }

    /// Whether output is wrapped in a standalone HTML page.
    #[must_use]
    pub fn with_stylesheet(mut self, stylesheet: bool) -> Self {
        self.stylesheet = stylesheet;
        self
    }

    pub const fn extensions(&self) -> ExtensionSet {
        self.extensions
    }

    /// Render `text` to the HTML that a preview should show.
    ///
    /// # Errors
    /// Returns the capability's [`RenderError`].
    pub fn run(&self, text: &str) -> Result<String, RenderError> {
        let body = self.capability.render(text, self.extensions)?;
        if self.stylesheet {
            Ok(wrap_with_stylesheet(&body))
        } else {
            Ok(body)
        }
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(Box::new(ComrakRenderer), ExtensionSet::standard())
    }
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("extensions", &self.extensions)
            .field("stylesheet", &self.stylesheet)
            .finish_non_exhaustive()
    }
}
