//! Directory listing using walkdir, limited to the top level.

use super::{Catalog, CatalogOptions, FileRecord};
use crate::error::ScanError;
use std::io::ErrorKind;
use std::path::Path;
use walkdir::WalkDir;

pub(super) fn scan_directory(root: &Path, options: &CatalogOptions) -> Result<Catalog, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut records = Vec::new();
    let mut skipped_processed = 0usize;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false);

    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                let kind = e.io_error().map(|io| io.kind());

                // Failing to open the root itself is fatal
                if e.depth() == 0 || path == root {
                    return Err(if kind == Some(ErrorKind::PermissionDenied) {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: e
                                .into_io_error()
                                .unwrap_or_else(|| std::io::Error::other("walk failed")),
                        }
                    });
                }

                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if !options.include_hidden
            && entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with('.'))
                .unwrap_or(false)
        {
            continue;
        }

        let Some(record) = FileRecord::new(path) else {
            continue;
        };

        if record.is_processed() && !options.include_processed {
            tracing::debug!(file = record.file_name(), "Skipping already processed output");
            skipped_processed += 1;
            continue;
        }

        records.push(record);
    }

    tracing::debug!(
        root = %root.display(),
        files = records.len(),
        skipped_processed,
        "Catalog scan complete"
    );

    Ok(Catalog::from_records(root, records).with_skipped_processed(skipped_processed))
}
