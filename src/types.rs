//! Core types and constants for the page builder

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Prefix of a directive line, after leading whitespace
pub const DIRECTIVE_MARKER: &str = "//#";

/// Kind of file a directive can reference.
///
/// Each category owns one search-path list and one resolved-resource table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Script = 0,
    Style = 1,
    Page = 2,
    Template = 3,
    Header = 4,
    Resource = 5,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Script,
        Category::Style,
        Category::Page,
        Category::Template,
        Category::Header,
        Category::Resource,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// Map a directive command word to its category
    pub fn from_directive(command: &str) -> Option<Self> {
        match command {
            "require" => Some(Self::Script),
            "style" => Some(Self::Style),
            "page" => Some(Self::Page),
            "template" => Some(Self::Template),
            "header" => Some(Self::Header),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            Self::Script => "require",
            Self::Style => "style",
            Self::Page => "page",
            Self::Template => "template",
            Self::Header => "header",
            Self::Resource => "resource",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Script => "script",
            Self::Style => "style",
            Self::Page => "page fragment",
            Self::Template => "template",
            Self::Header => "header fragment",
            Self::Resource => "resource",
        };
        f.write_str(name)
    }
}

/// How styles, scripts and resources reach the output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Symlink,
    Hardlink,
    Copy,
    /// Styles and scripts are inlined into the page
    #[default]
    OneFile,
}

impl BuildMode {
    pub fn is_inline(self) -> bool {
        self == Self::OneFile
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "s" | "symlink" => Ok(Self::Symlink),
            "h" | "hardlink" => Ok(Self::Hardlink),
            "c" | "copy" => Ok(Self::Copy),
            "o" | "p" | "onefile" | "single-file" => Ok(Self::OneFile),
            other => Err(format!(
                "Invalid build mode: {} is not in (symlink, hardlink, copy, onefile)",
                other
            )),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Symlink => "symlink",
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
            Self::OneFile => "onefile",
        };
        f.write_str(name)
    }
}

/// A source file registered during directive processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedResource {
    /// Output name, relative to the page's directory
    pub target: String,
    /// Discovery order; drives emission order
    pub sequence: usize,
}
