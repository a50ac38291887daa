//! Directive processing: discovers every file a page depends on
//!
//! Starting at the root script, each file is scanned once for directives.
//! Referenced files are resolved relative to the referencing file first and
//! then through the category's search paths. Required scripts are scanned
//! recursively before they are registered, so a dependency always gets a
//! lower sequence number than the script that pulled it in.

use crate::directive;
use crate::error::{log_warning, BuildError, Result, Warning, WarningSink};
use crate::resolver::{is_regular_file, SearchPaths};
use crate::types::{BuildMode, Category, ResolvedResource};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub type ResourceTable = HashMap<PathBuf, ResolvedResource>;

pub struct PageBuilder {
    warning: WarningSink,
    pub(crate) tables: [ResourceTable; Category::COUNT],
    owners: HashMap<PathBuf, Category>,
    processed: HashSet<PathBuf>,
    allocated: HashSet<String>,
    sequence: usize,
    pub(crate) warnings: usize,
    root: Option<PathBuf>,
    search_paths: SearchPaths,
    pub(crate) last_build: Option<(PathBuf, BuildMode)>,
}

impl PageBuilder {
    pub fn new(sink: impl FnMut(Warning) + 'static) -> Self {
        Self {
            warning: Box::new(sink),
            tables: Default::default(),
            owners: HashMap::new(),
            processed: HashSet::new(),
            allocated: HashSet::new(),
            sequence: 0,
            warnings: 0,
            root: None,
            search_paths: SearchPaths::default(),
            last_build: None,
        }
    }

    /// Builder that reports warnings through `log::warn!`
    pub fn with_log_sink() -> Self {
        Self::new(log_warning)
    }

    /// Resolve every dependency of `src_file`, discarding the previous build's state.
    ///
    /// The root file itself is registered last as a script under its own file
    /// name, so its code follows everything it requires.
    pub fn prepare(&mut self, src_file: &Path, paths: &SearchPaths) {
        for table in self.tables.iter_mut() {
            table.clear();
        }
        self.owners.clear();
        self.processed.clear();
        self.allocated.clear();
        self.sequence = 0;
        self.warnings = 0;
        self.search_paths = paths.clone();

        let root = normalize(src_file);
        log::debug!("Preparing page from {}", root.display());
        self.root = Some(root.clone());

        self.process_file(&root);

        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.sequence += 1;
        let sequence = self.sequence;
        self.register(Category::Script, root.clone(), &name, sequence, &root, 0);
    }

    /// Scan one file for directives.
    ///
    /// Returns `false` when the file was already scanned during this build.
    /// A file that cannot be opened counts as scanned with zero lines; the
    /// problem surfaces when the page is assembled.
    pub fn process_file(&mut self, src_file: &Path) -> bool {
        if !self.processed.insert(src_file.to_path_buf()) {
            return false;
        }

        let file = match File::open(src_file) {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Cannot scan {}: {}", src_file.display(), e);
                return true;
            }
        };
        let context_dir = src_file.parent().unwrap_or(Path::new("")).to_path_buf();

        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        let mut line_number = 0;
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    log::debug!("Stopped reading {}: {}", src_file.display(), e);
                    break;
                }
            }
            line_number += 1;

            let line = String::from_utf8_lossy(&buffer);
            let Some(directive) = directive::parse_line(&line) else {
                continue;
            };

            let Some(category) = Category::from_directive(directive.command) else {
                self.warn(Warning::new(
                    src_file,
                    line_number,
                    format!(
                        "Unknown directive: {}. Only allowed: require, style, page, template, header, resource",
                        directive.command
                    ),
                ));
                continue;
            };

            let Some(path) = self.resolve(category, &context_dir, directive.param) else {
                self.warn(Warning::new(
                    src_file,
                    line_number,
                    format!("Linked resource was not found: {}", directive.param),
                ));
                continue;
            };

            log::debug!(
                "{}:{} {} {} -> {}",
                src_file.display(),
                line_number,
                category.directive(),
                directive.param,
                path.display()
            );

            if self.claimed_elsewhere(category, &path, src_file, line_number) {
                continue;
            }

            // a script is numbered after its own requirements
            let include = match category {
                Category::Script => self.process_file(&path),
                _ => true,
            };
            self.sequence += 1;
            let sequence = self.sequence;
            if include {
                self.register(category, path, directive.param, sequence, src_file, line_number);
            }
        }
        true
    }

    /// The referencing file's directory wins over the search paths
    fn resolve(&self, category: Category, context_dir: &Path, name: &str) -> Option<PathBuf> {
        let local = context_dir.join(name);
        let found = if is_regular_file(&local) {
            Some(local)
        } else {
            self.search_paths.find(category, name)
        };
        found.map(|p| normalize(&p))
    }

    /// Add `path` to the category's table unless it is already known.
    fn register(
        &mut self,
        category: Category,
        path: PathBuf,
        requested: &str,
        sequence: usize,
        origin: &Path,
        line: usize,
    ) {
        if self.claimed_elsewhere(category, &path, origin, line) || self.owners.contains_key(&path) {
            return;
        }

        let target = self.allocate(requested, sequence);
        log::debug!("Registered {} {} as {}", category, path.display(), target);
        self.owners.insert(path.clone(), category);
        self.tables[category.index()].insert(path, ResolvedResource { target, sequence });
    }

    /// Warn when `path` is already registered under a different category
    fn claimed_elsewhere(&mut self, category: Category, path: &Path, origin: &Path, line: usize) -> bool {
        match self.owners.get(path) {
            Some(&owner) if owner != category => {
                self.warn(Warning::new(
                    origin,
                    line,
                    format!(
                        "{} is already linked as {}, ignoring it as {}",
                        path.display(),
                        owner,
                        category
                    ),
                ));
                true
            }
            _ => false,
        }
    }

    /// Claim a target name, inserting `.<sequence>` before the extension on collision
    fn allocate(&mut self, requested: &str, sequence: usize) -> String {
        let mut name = requested.to_string();
        while !self.allocated.insert(name.clone()) {
            name = with_suffix(&name, sequence);
        }
        name
    }

    fn warn(&mut self, warning: Warning) {
        self.warnings += 1;
        (self.warning)(warning);
    }

    pub(crate) fn report(&mut self, warning: Warning) {
        self.warn(warning);
    }

    /// Resolved resources of one category in emission order
    pub fn resources(&self, category: Category) -> Vec<(&Path, &ResolvedResource)> {
        let mut entries: Vec<_> = self.tables[category.index()]
            .iter()
            .map(|(path, resource)| (path.as_path(), resource))
            .collect();
        entries.sort_by_key(|(_, resource)| resource.sequence);
        entries
    }

    /// Owned copy of [`Self::resources`], for loops that need `&mut self`
    pub(crate) fn sorted_entries(&self, category: Category) -> Vec<(PathBuf, String)> {
        self.resources(category)
            .into_iter()
            .map(|(path, resource)| (path.to_path_buf(), resource.target.clone()))
            .collect()
    }

    /// Every source file registered by the last `prepare`
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.owners.keys().map(PathBuf::as_path)
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Warnings reported since the last `prepare`
    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    /// Prepare and build again with the last root, search paths, target and mode
    pub fn rebuild(&mut self) -> Result<crate::BuildStats> {
        let root = self
            .root
            .clone()
            .ok_or_else(|| BuildError::config("Nothing to rebuild: no page was prepared"))?;
        let (target, mode) = self
            .last_build
            .clone()
            .ok_or_else(|| BuildError::config("Nothing to rebuild: no page was built"))?;
        let paths = self.search_paths.clone();
        self.prepare(&root, &paths);
        self.build(&target, mode)
    }
}

/// `lib/app.js` + 7 -> `lib/app.7.js`; names without an extension get the suffix appended
fn with_suffix(name: &str, sequence: usize) -> String {
    let base_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    let dot = match name[base_start..].rfind('.') {
        Some(i) if i > 0 => base_start + i,
        _ => name.len(),
    };
    format!("{}.{}{}", &name[..dot], sequence, &name[dot..])
}

/// Absolute, symlink-free form of `path` when it exists; absolute otherwise
pub(crate) fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|dir| dir.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
