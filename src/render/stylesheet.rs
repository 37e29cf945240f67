//! Standalone HTML page around rendered markdown.

/// Styles applied to every standalone preview page.
pub const STYLESHEET: &str = r#"
body {
    margin: 0 auto;
    max-width: 48em;
    padding: 1.5em;
    font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif;
    font-size: 16px;
    line-height: 1.6;
    color: #24292f;
    background: #ffffff;
}
h1, h2 { border-bottom: 1px solid #d0d7de; padding-bottom: 0.3em; }
a { color: #0969da; text-decoration: none; }
a:hover { text-decoration: underline; }
code, pre {
    font-family: ui-monospace, "SFMono-Regular", Menlo, Consolas, monospace;
    font-size: 0.9em;
}
code { background: #f6f8fa; padding: 0.1em 0.3em; border-radius: 4px; }
pre { background: #f6f8fa; padding: 0.8em 1em; overflow: auto; border-radius: 6px; }
pre code { background: none; padding: 0; }
.codehilite pre { padding: 0.8em 1em; }
blockquote { margin: 0; padding: 0 1em; color: #57606a; border-left: 0.25em solid #d0d7de; }
table { border-collapse: collapse; }
th, td { border: 1px solid #d0d7de; padding: 0.3em 0.8em; }
abbr[title] { text-decoration: underline dotted; cursor: help; }
.toc { background: #f6f8fa; border: 1px solid #d0d7de; border-radius: 6px; padding: 0.5em 1em; }
.toc ul { margin: 0.2em 0; padding-left: 1.2em; }
.error { color: #cf222e; white-space: pre-wrap; font-family: ui-monospace, monospace; }
"#;

/// Wrap an HTML fragment in a complete page carrying [`STYLESHEET`].
pub fn wrap_with_stylesheet(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{STYLESHEET}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_places_body_inside_page() {
        let page = wrap_with_stylesheet("<p>x</p>\n");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<body>\n<p>x</p>\n</body>"));
        assert!(page.ends_with("</html>\n"));
    }
}
