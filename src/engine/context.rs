//! Build context packing: the build directory as an in-memory tar archive.

use std::path::Path;

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

pub const DOCKERFILE: &str = "Dockerfile";

/// Tar up `dir` (paths relative to it, symlinks kept as links).
pub fn pack_build_context(dir: &Path) -> Result<Vec<u8>> {
    if !dir.join(DOCKERFILE).is_file() {
        bail!("no {DOCKERFILE} found in {}", dir.display());
    }
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        let rel = entry
            .path()
            .strip_prefix(dir)
            .with_context(|| format!("{} escapes {}", entry.path().display(), dir.display()))?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        builder
            .append_path_with_name(entry.path(), rel)
            .with_context(|| format!("failed to add {} to build context", rel.display()))?;
    }
    builder
        .into_inner()
        .context("failed to finish build context archive")
}
