//! Search-path lookup for directive parameters

use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Ordered search directories, one list per category.
///
/// Directories are tried in the order they were added; the first directory
/// holding a regular file with the requested name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPaths {
    #[serde(default)]
    pub scripts: Vec<PathBuf>,
    #[serde(default)]
    pub styles: Vec<PathBuf>,
    #[serde(default)]
    pub fragments: Vec<PathBuf>,
    #[serde(default)]
    pub templates: Vec<PathBuf>,
    #[serde(default)]
    pub headers: Vec<PathBuf>,
    #[serde(default)]
    pub resources: Vec<PathBuf>,
}

impl SearchPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Script => &self.scripts,
            Category::Style => &self.styles,
            Category::Page => &self.fragments,
            Category::Template => &self.templates,
            Category::Header => &self.headers,
            Category::Resource => &self.resources,
        }
    }

    pub fn list_mut(&mut self, category: Category) -> &mut Vec<PathBuf> {
        match category {
            Category::Script => &mut self.scripts,
            Category::Style => &mut self.styles,
            Category::Page => &mut self.fragments,
            Category::Template => &mut self.templates,
            Category::Header => &mut self.headers,
            Category::Resource => &mut self.resources,
        }
    }

    /// Builder-style append, mostly for tests and library callers
    pub fn with(mut self, category: Category, dir: impl Into<PathBuf>) -> Self {
        self.list_mut(category).push(dir.into());
        self
    }

    /// Append every list of `other` after the lists of `self`
    pub fn extend(&mut self, other: &SearchPaths) {
        for category in Category::ALL {
            self.list_mut(category).extend(other.list(category).iter().cloned());
        }
    }

    /// Find the first `dir/name` that is a regular file
    pub fn find(&self, category: Category, name: &str) -> Option<PathBuf> {
        self.list(category).iter().find_map(|dir| {
            let candidate = dir.join(name);
            is_regular_file(&candidate).then_some(candidate)
        })
    }
}

/// True for regular files (following symlinks); directories and special files are excluded
pub fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
