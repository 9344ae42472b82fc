//! Filesystem discovery of convertible images

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::batch::report::BatchReporter;
use crate::config::PathFilter;
use crate::error::Result;

/// Discovery notifications are batched so the reporter is not pinged per file.
const NOTIFY_BATCH: u64 = 20;

/// Recursively collect all regular files under `root` matching the filter.
///
/// Traversal is all-or-nothing: any entry that cannot be classified fails
/// the whole walk and nothing is scheduled. An empty result is a valid
/// outcome, distinct from a traversal error. The returned sequence is
/// consumed exactly once to seed the batch.
pub fn discover(
    root: &Path,
    filter: &PathFilter,
    reporter: &dyn BatchReporter,
) -> Result<Vec<PathBuf>> {
    reporter.on_phase_start("Searching images", None);
    let result = walk(root, filter, reporter);
    reporter.on_phase_end();

    if let Ok(ref files) = result {
        info!("Discovered {} convertible files under {:?}", files.len(), root);
    }

    result
}

fn walk(
    root: &Path,
    filter: &PathFilter,
    reporter: &dyn BatchReporter,
) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = 0u64;

    for entry in WalkDir::new(root) {
        let entry = entry?;

        // Symlinks and directories never reach the filter
        if !entry.file_type().is_file() {
            continue;
        }

        if filter.matches(entry.path()) {
            debug!("Matched {:?}", entry.path());
            files.push(entry.into_path());

            pending += 1;
            if pending >= NOTIFY_BATCH {
                reporter.on_discovered(pending);
                pending = 0;
            }
        }
    }

    if pending > 0 {
        reporter.on_discovered(pending);
    }

    Ok(files)
}
