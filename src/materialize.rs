//! Output materialization: places linked files next to the page

use crate::builder::PageBuilder;
use crate::error::Warning;
use crate::types::{BuildMode, Category};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

impl PageBuilder {
    /// Copy or link every resolved file of `category` under `target_dir`.
    ///
    /// Returns the number of files placed. Failures are reported per file.
    pub fn materialize(&mut self, category: Category, target_dir: &Path, mode: BuildMode) -> usize {
        let mut placed = 0;
        for (src, target) in self.sorted_entries(category) {
            if escapes_directory(&target) {
                let message = format!("skipped, {} is outside the output directory", target);
                self.report(Warning::for_file(&src, message));
                continue;
            }
            let full_target = target_dir.join(&target);
            if same_location(&src, &full_target) {
                self.report(Warning::for_file(&full_target, "skipped, points to the same file"));
                continue;
            }
            match place_file(&src, &full_target, mode) {
                Ok(()) => {
                    log::debug!("{} {} -> {}", mode, src.display(), full_target.display());
                    placed += 1;
                }
                Err(e) => {
                    self.report(Warning::for_file(&full_target, format!("Failed to link: {}", e)));
                }
            }
        }
        placed
    }
}

/// Replace whatever is at `target` with a copy or link of `src`
pub fn place_file(src: &Path, target: &Path, mode: BuildMode) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target)?;
    }
    match mode {
        BuildMode::Hardlink => fs::hard_link(src, target),
        BuildMode::Symlink => symlink(src, target),
        BuildMode::Copy | BuildMode::OneFile => fs::copy(src, target).map(|_| ()),
    }
}

#[cfg(unix)]
fn symlink(src: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, target)
}

#[cfg(windows)]
fn symlink(src: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, target)
}

/// True when a target name is absolute or climbs out with `..`
fn escapes_directory(target: &str) -> bool {
    Path::new(target)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

/// True when `target` names `src` itself, looking through directory symlinks
/// but not through a link already sitting at `target`.
fn same_location(src: &Path, target: &Path) -> bool {
    if src == target {
        return true;
    }
    let resolved: Option<PathBuf> = target
        .parent()
        .and_then(|parent| fs::canonicalize(parent).ok())
        .zip(target.file_name())
        .map(|(parent, name)| parent.join(name));
    resolved.as_deref() == Some(src)
}
