//! Write submission CSVs to disk.
//!
//! The rows themselves are produced by the session
//! ([`SessionController::export_csv`]); this module only places the file
//! under `[export].dir`, or prints it when no directory is wanted.

use anyhow::{bail, Context, Result};
use frame_search_core::export::CsvExport;
use frame_search_core::session::SessionController;
use std::path::{Path, PathBuf};

/// Export the session's current CSV.
///
/// If `dir` is `Some`, writes `<dir>/<file_name>` and returns the path.
/// Otherwise writes the content to stdout.
pub fn write_export(
    controller: &SessionController,
    file_name: Option<&str>,
    dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let csv = controller.export_csv(file_name)?;
    match dir {
        Some(dir) => write_csv(&csv, dir).map(Some),
        None => {
            println!("{}", csv.content);
            Ok(None)
        }
    }
}

pub fn write_csv(csv: &CsvExport, dir: &Path) -> Result<PathBuf> {
    let name = csv.file_name.as_str();
    let plain_name = !name.contains(['/', '\\'])
        && Path::new(name).file_name() == Some(std::ffi::OsStr::new(name));
    if !plain_name {
        bail!(
            "Invalid export name '{}': use a file name without directories",
            csv.file_name
        );
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;
    let path = dir.join(&csv.file_name);
    std::fs::write(&path, &csv.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = csv.rows, "exported csv");
    eprintln!("Exported {} rows to {}", csv.rows, path.display());
    Ok(path)
}
