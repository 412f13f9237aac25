//! Simple orphan finder used by the copy, rename and stackcopy modes.
//!
//! No sequencing: every unprocessed JPEG without a raw sibling counts.

use crate::core::catalog::{Catalog, FileRecord};
use chrono::NaiveDate;

/// JPEGs with no same-stem raw file, optionally limited to one day
pub fn find_orphans(catalog: &Catalog, date_filter: Option<NaiveDate>) -> Vec<&FileRecord> {
    catalog
        .orphan_jpegs()
        .filter(|record| !record.is_processed())
        .filter(|record| match date_filter {
            None => true,
            Some(date) => match record.modified_date() {
                Some(file_date) => file_date == date,
                None => {
                    tracing::warn!(
                        file = record.file_name(),
                        "Could not determine date, skipping"
                    );
                    false
                }
            },
        })
        .collect()
}
