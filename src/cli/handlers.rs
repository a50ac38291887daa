use super::Cli;
use crate::builder::PageBuilder;
use crate::error::{BuildError, Result};
use crate::server::PreviewServer;
use crate::types::Category;
use crate::{BuildOptions, BuildStats};

use clap::ArgMatches;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

/// Quiet period after a change before rebuilding, so one save is one rebuild
const SETTLE_TIME: Duration = Duration::from_millis(100);

// --- BUILD ---
pub fn handle_build_command(cli: &Cli, matches: &ArgMatches) -> Result<()> {
    let source = cli.source_path(matches)?;
    let output = cli.output_path(matches)?;
    let options = cli.build_options(matches)?;

    let mut builder = PageBuilder::with_log_sink();
    println!("🔨 Building {} -> {} ({})", source.display(), output.display(), options.mode);
    let stats = prepare_and_build(&mut builder, &source, &output, &options)?;
    print_summary(&stats, cli.elapsed_ms());

    if matches.get_flag("watch") {
        watch_and_rebuild(&mut builder)
    } else {
        Ok(())
    }
}

fn prepare_and_build(
    builder: &mut PageBuilder,
    source: &Path,
    output: &Path,
    options: &BuildOptions,
) -> Result<BuildStats> {
    if !crate::resolver::is_regular_file(source) {
        return Err(BuildError::FileNotFound {
            path: source.display().to_string(),
        });
    }
    builder.prepare(source, &options.search_paths);
    builder.build(output, options.mode)
}

fn print_summary(stats: &BuildStats, elapsed_ms: u128) {
    println!("✅ Build finished");
    println!(
        "   Scripts: {}, styles: {}, headers: {}, fragments: {}, templates: {}, resources: {}",
        stats.scripts, stats.styles, stats.headers, stats.fragments, stats.templates, stats.resources
    );
    println!("   Output: {} bytes", stats.output_size);
    if stats.warning_count > 0 {
        println!("   Warnings: {}", stats.warning_count);
    }
    println!("   Time: {}ms", elapsed_ms);
}

fn watch_and_rebuild(builder: &mut PageBuilder) -> Result<()> {
    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(e) = tx.send(event) {
                    log::error!("Watch channel closed: {}", e);
                }
            }
            Err(e) => log::error!("Watch error: {}", e),
        },
        notify::Config::default(),
    )
    .map_err(|e| BuildError::watch(format!("Failed to create file watcher: {}", e)))?;

    let mut sources: HashSet<PathBuf> = builder.sources().map(Path::to_path_buf).collect();
    let mut watched = watch_dirs(&sources);
    for dir in &watched {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| BuildError::watch(format!("Failed to watch {}: {}", dir.display(), e)))?;
    }
    println!("👀 Watching {} files for changes...", sources.len());

    while let Ok(event) = rx.recv() {
        if !is_relevant(&event, &sources) {
            continue;
        }
        std::thread::sleep(SETTLE_TIME);
        while rx.try_recv().is_ok() {}

        println!("🔄 Source changed, rebuilding...");
        match builder.rebuild() {
            Ok(stats) => println!(
                "✅ Rebuilt ({} bytes, {}ms, {} warnings)",
                stats.output_size, stats.build_time_ms, stats.warning_count
            ),
            Err(e) => eprintln!("❌ Build failed: {}", e),
        }

        // directives may have changed what the page depends on
        sources = builder.sources().map(Path::to_path_buf).collect();
        let next = watch_dirs(&sources);
        for dir in watched.difference(&next) {
            if let Err(e) = watcher.unwatch(dir) {
                log::debug!("Failed to unwatch {}: {}", dir.display(), e);
            }
        }
        for dir in next.difference(&watched) {
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                log::warn!("Failed to watch {}: {}", dir.display(), e);
            }
        }
        watched = next;
    }

    Err(BuildError::watch("File watcher stopped"))
}

/// Directories holding the sources; editors often replace files instead of writing them
fn watch_dirs(sources: &HashSet<PathBuf>) -> BTreeSet<PathBuf> {
    sources
        .iter()
        .filter_map(|path| path.parent().map(Path::to_path_buf))
        .collect()
}

fn is_relevant(event: &Event, sources: &HashSet<PathBuf>) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event.paths.iter().any(|p| sources.contains(p))
}

// --- SERVE ---
pub fn handle_serve_command(cli: &Cli, matches: &ArgMatches) -> Result<()> {
    let source = cli.source_path(matches)?;
    let output = cli.output_path(matches)?;
    let options = cli.build_options(matches)?;
    let address = cli.server_address(matches)?;

    let mut builder = PageBuilder::with_log_sink();
    let stats = prepare_and_build(&mut builder, &source, &output, &options)?;
    print_summary(&stats, cli.elapsed_ms());

    let server = PreviewServer::bind(&address, &output)?;
    println!("🌐 Server started at http://{}/ . Press Ctrl-C to stop", address);
    server.run(&mut builder)
}

// --- CHECK ---
pub fn handle_check_command(cli: &Cli, matches: &ArgMatches) -> Result<()> {
    let source = cli.source_path(matches)?;
    let options = cli.build_options(matches)?;
    if !crate::resolver::is_regular_file(&source) {
        return Err(BuildError::FileNotFound {
            path: source.display().to_string(),
        });
    }

    println!("🔍 Checking {}", source.display());
    let mut builder = PageBuilder::with_log_sink();
    builder.prepare(&source, &options.search_paths);

    for category in Category::ALL {
        let resources = builder.resources(category);
        if resources.is_empty() {
            continue;
        }
        println!("{} ({}):", category, resources.len());
        for (path, resource) in resources {
            println!("  {:>4} {} -> {}", resource.sequence, path.display(), resource.target);
        }
    }

    match builder.warning_count() {
        0 => {
            println!("✅ {} - No issues found", source.display());
            Ok(())
        }
        count => Err(BuildError::invalid_format(format!(
            "{} warning(s) in {}",
            count,
            source.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    fn sources(paths: &[&str]) -> HashSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_watch_dirs_are_unique_parents() {
        let dirs = watch_dirs(&sources(&["/app/main.js", "/app/util.js", "/css/site.css"]));
        assert_eq!(
            dirs.into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("/app"), PathBuf::from("/css")]
        );
    }

    #[test]
    fn test_only_source_changes_are_relevant() {
        let sources = sources(&["/app/main.js"]);

        let change = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/app/main.js"));
        assert!(is_relevant(&change, &sources));

        let created = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/app/main.js"));
        assert!(is_relevant(&created, &sources));

        let other_file = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from("/app/notes.txt"));
        assert!(!is_relevant(&other_file, &sources));

        let read = Event::new(EventKind::Access(AccessKind::Any)).add_path(PathBuf::from("/app/main.js"));
        assert!(!is_relevant(&read, &sources));
    }

    #[test]
    fn test_prepare_and_build_missing_source() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut builder = PageBuilder::new(|_| {});
        let result = prepare_and_build(
            &mut builder,
            &temp_dir.path().join("missing.js"),
            &temp_dir.path().join("index.html"),
            &BuildOptions::default(),
        );
        assert!(matches!(result, Err(BuildError::FileNotFound { .. })));
        assert!(!temp_dir.path().join("index.html").exists());
    }
}
