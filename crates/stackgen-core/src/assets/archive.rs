//! Staging and extraction of downloaded archives.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;

/// Write `data` as `dest/archive_name`, expand it into `dest`, then delete
/// the archive. `dest` is created when absent.
pub fn stage_and_extract(data: &[u8], dest: &Path, archive_name: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create extract directory: {}", dest.display()))?;

    let archive_path = dest.join(archive_name);
    std::fs::write(&archive_path, data)
        .with_context(|| format!("Failed to stage archive: {}", archive_path.display()))?;

    let file = std::fs::File::open(&archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive: {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read zip entry {}", i))?;

        // Entries escaping the destination are skipped
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .with_context(|| format!("Failed to create directory: {}", outpath.display()))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create parent directory: {}", parent.display())
            })?;
        }

        let mut buffer = Vec::new();
        entry
            .read_to_end(&mut buffer)
            .with_context(|| format!("Failed to read zip entry: {}", entry.name()))?;

        let mut outfile = std::fs::File::create(&outpath)
            .with_context(|| format!("Failed to create file: {}", outpath.display()))?;
        outfile
            .write_all(&buffer)
            .with_context(|| format!("Failed to write file: {}", outpath.display()))?;
    }

    drop(archive);
    std::fs::remove_file(&archive_path)
        .with_context(|| format!("Failed to remove archive: {}", archive_path.display()))?;

    Ok(())
}
