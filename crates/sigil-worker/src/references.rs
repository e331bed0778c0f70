use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// Image files directly inside `directory`, sorted by path, at most `limit`
///
/// A missing or unreadable directory yields no paths.
pub fn discover_reference_paths(directory: &Path, limit: usize) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            if directory.exists() {
                tracing::warn!(directory = %directory.display(), error = %e, "cannot read reference directory");
            }
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();

    paths.sort();
    paths.truncate(limit);
    paths
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
}
