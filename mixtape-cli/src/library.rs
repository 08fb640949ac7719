//! Music library scanning

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Audio extensions picked up by the scanner
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "wav", "flac", "ogg"];

/// Recursively collect audio files under the configured roots.
///
/// Results are sorted for deterministic enqueue order.
pub fn scan_audio_files(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = roots
        .iter()
        .flat_map(|root| {
            WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_audio_file(path))
        })
        .collect();
    files.sort();
    files.dedup();
    debug!(count = files.len(), "Library scan complete");
    files
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
