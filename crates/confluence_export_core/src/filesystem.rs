use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result};

pub const PAGE_FILENAME: &str = "page.md";
pub const ATTACHMENTS_DIRNAME: &str = "attachments";

const RESERVED_CHARS: [char; 10] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', ' '];

/// Replace characters that are unsafe in directory names (and spaces) with `_`.
///
/// Only applied to space and page names; attachment file names are written as
/// the server reports them.
pub fn sanitize_directory_name(name: &str) -> String {
    name.chars()
        .map(|ch| if RESERVED_CHARS.contains(&ch) { '_' } else { ch })
        .collect()
}

/// Create a directory and its parents. Existing directories are fine.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("failed to create {}", path.display()))
}

/// Write a file, replacing whatever was there.
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// True when `name` is one plain path component, so joining it stays inside its parent.
pub fn is_single_path_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
