//! Web Page Builder
//!
//! Assembles a single HTML page from a root script whose `//#` directive
//! comments pull in other scripts, stylesheets, HTML fragments, templates
//! and binary resources.
//!
//! # Features
//!
//! - Recursive `//#require` resolution with cycle safety
//! - Per-category search paths, tried after the referencing file's directory
//! - Single-file output with comment-stripped inline CSS and JavaScript
//! - Linked output with copied, hard-linked or symlinked sibling files
//! - Collision-free target names
//! - Preview server that rebuilds the page on every request for it
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use webproject::{build_page, BuildOptions, Result};
//!
//! fn main() -> Result<()> {
//!     build_page("src/main.js", "out/index.html", &BuildOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! # Build Pipeline
//!
//! 1. **Prepare**: scan the root script and everything it references,
//!    assigning each resolved file a sequence number and a target name
//! 2. **Assemble**: write headers, styles, templates, fragments and scripts
//!    into the page in that fixed order
//! 3. **Materialize**: place linked styles, scripts and resources next to
//!    the page

pub mod error;
pub mod types;
pub mod resolver;
pub mod directive;
pub mod filter;
pub mod builder;
pub mod assembler;
pub mod materialize;
pub mod server;
pub mod cli;

use serde::Serialize;
use std::path::Path;

pub use builder::PageBuilder;
pub use cli::Cli;
pub use error::{BuildError, Result, Warning};
pub use filter::{CssFilter, JsFilter, StreamFilter};
pub use resolver::SearchPaths;
pub use server::PreviewServer;
pub use types::{BuildMode, Category, ResolvedResource};

/// Builder version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build options and settings
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Directories searched per category after the referencing file's own
    pub search_paths: SearchPaths,

    /// How styles, scripts and resources reach the output
    pub mode: BuildMode,
}

/// Build statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStats {
    pub scripts: usize,
    pub styles: usize,
    pub fragments: usize,
    pub templates: usize,
    pub headers: usize,
    pub resources: usize,

    /// Warnings reported during prepare and build
    pub warning_count: usize,

    /// Size of the written page in bytes
    pub output_size: u64,

    pub build_time_ms: u64,
}

/// Build one page; warnings go to the log
pub fn build_page(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: &BuildOptions,
) -> Result<BuildStats> {
    let source = source.as_ref();
    if !resolver::is_regular_file(source) {
        return Err(BuildError::FileNotFound {
            path: source.display().to_string(),
        });
    }
    log::info!("{} v{}", NAME, VERSION);
    log::debug!("Build options: {:?}", options);

    let mut builder = PageBuilder::with_log_sink();
    builder.prepare(source, &options.search_paths);
    builder.build(target.as_ref(), options.mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// main.js with a style and a script found only through search paths
    fn create_project(dir: &Path) -> (PathBuf, SearchPaths) {
        fs::create_dir_all(dir.join("app")).unwrap();
        fs::create_dir_all(dir.join("css")).unwrap();
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("css/a.css"), "body { margin: 0 } /* reset */").unwrap();
        fs::write(dir.join("lib/b.js"), "var b = 1; // helper\n").unwrap();
        fs::write(
            dir.join("app/main.js"),
            "//#style \"a.css\"\n//#require \"b.js\"\nstart(b);\n",
        )
        .unwrap();

        let paths = SearchPaths::new()
            .with(Category::Style, dir.join("css"))
            .with(Category::Script, dir.join("lib"));
        (dir.join("app/main.js"), paths)
    }

    fn capturing_builder() -> (PageBuilder, Arc<Mutex<Vec<Warning>>>) {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let sink = warnings.clone();
        (PageBuilder::new(move |w| sink.lock().unwrap().push(w)), warnings)
    }

    #[test]
    fn test_single_file_build() {
        let temp_dir = TempDir::new().unwrap();
        let (main, paths) = create_project(temp_dir.path());
        let target = temp_dir.path().join("out/index.html");

        let (mut builder, warnings) = capturing_builder();
        builder.prepare(&main, &paths);
        let stats = builder.build(&target, BuildMode::OneFile).unwrap();

        assert!(warnings.lock().unwrap().is_empty());
        assert_eq!((stats.scripts, stats.styles), (2, 1));

        let html = fs::read_to_string(&target).unwrap();
        assert_eq!(html.matches("<style>").count(), 1);
        assert_eq!(html.matches("<script").count(), 1);
        assert!(html.contains("<style>\nbody { margin: 0 } \n\n</style>"));
        assert!(!html.contains("reset"));
        assert!(!html.contains("helper"));

        let lib = html.find("var b = 1;").unwrap();
        let own = html.find("start(b);").unwrap();
        assert!(lib < own);

        assert!(!temp_dir.path().join("out/a.css").exists());
        assert!(!temp_dir.path().join("out/b.js").exists());
    }

    #[test]
    fn test_copy_mode_build() {
        let temp_dir = TempDir::new().unwrap();
        let (main, paths) = create_project(temp_dir.path());
        let out = temp_dir.path().join("out");
        let target = out.join("index.html");

        let (mut builder, warnings) = capturing_builder();
        builder.prepare(&main, &paths);
        builder.build(&target, BuildMode::Copy).unwrap();

        assert!(warnings.lock().unwrap().is_empty());
        let html = fs::read_to_string(&target).unwrap();
        assert!(html.contains("<link rel=\"stylesheet\" href=\"a.css\">"));
        assert!(html.contains(
            "<script type=\"text/javascript\" src=\"b.js\"></script><script type=\"text/javascript\" src=\"main.js\"></script>"
        ));
        assert!(!html.contains("var b = 1;"));

        for name in ["a.css", "b.js"] {
            let meta = fs::symlink_metadata(out.join(name)).unwrap();
            assert!(meta.file_type().is_file());
        }
        assert_eq!(
            fs::read_to_string(out.join("a.css")).unwrap(),
            "body { margin: 0 } /* reset */"
        );
    }

    #[test]
    fn test_rebuild_picks_up_changes() {
        let temp_dir = TempDir::new().unwrap();
        let (main, paths) = create_project(temp_dir.path());
        let target = temp_dir.path().join("out/index.html");

        let (mut builder, _) = capturing_builder();
        builder.prepare(&main, &paths);
        builder.build(&target, BuildMode::OneFile).unwrap();

        fs::write(temp_dir.path().join("lib/c.js"), "var c;").unwrap();
        fs::write(&main, "//#require c.js\nstart(c);\n").unwrap();
        let stats = builder.rebuild().unwrap();

        assert_eq!(stats.styles, 0);
        let html = fs::read_to_string(&target).unwrap();
        assert!(html.contains("var c;"));
        assert!(!html.contains("var b = 1;"));
    }

    #[test]
    fn test_build_page_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let result = build_page(
            temp_dir.path().join("missing.js"),
            temp_dir.path().join("index.html"),
            &BuildOptions::default(),
        );
        assert!(matches!(result, Err(BuildError::FileNotFound { .. })));
    }

    #[test]
    fn test_build_page_default_options() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("main.js");
        fs::write(&source, "go();").unwrap();

        let stats = build_page(&source, temp_dir.path().join("site/index.html"), &BuildOptions::default()).unwrap();
        assert_eq!(stats.scripts, 1);
        assert!(stats.output_size > 0);
    }

    #[test]
    fn test_build_stats_serialize() {
        let stats = BuildStats {
            scripts: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["scripts"], 2);
        assert_eq!(json["warning_count"], 0);
    }
}
