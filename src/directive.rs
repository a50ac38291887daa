//! Directive line parsing
//!
//! A directive is a source line that, after leading whitespace, starts with
//! `//#`, followed by a command word, whitespace and a parameter that may be
//! wrapped in double quotes:
//!
//! ```text
//! //#require "lib/util.js"
//! //#style theme.css
//! ```

use crate::types::DIRECTIVE_MARKER;

/// One parsed directive line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    pub command: &'a str,
    pub param: &'a str,
}

/// Parse a single source line.
///
/// Returns `None` for ordinary lines and for marker lines without a
/// command/parameter separator (such as `//#sourceMappingURL=...`).
pub fn parse_line(line: &str) -> Option<Directive<'_>> {
    let rest = line.trim().strip_prefix(DIRECTIVE_MARKER)?;
    let sep = rest.find(char::is_whitespace)?;
    let command = &rest[..sep];
    let param = unquote(rest[sep..].trim());
    Some(Directive { command, param })
}

/// Strip one layer of surrounding double quotes
fn unquote(param: &str) -> &str {
    if param.len() > 1 && param.starts_with('"') && param.ends_with('"') {
        &param[1..param.len() - 1]
    } else {
        param
    }
}
