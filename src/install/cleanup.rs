//! Bookkeeping for staged configuration files.
//!
//! Every staged file is registered here and resolved exactly once when the
//! installation reaches a terminal outcome. The `cleanup_on_success_only`
//! flag is an explicit constructor parameter: when set, a failed run
//! preserves the staged files for post-mortem inspection. Successful and
//! cancelled runs always delete them.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Terminal state of a registered file. Each entry leaves `Pending` exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Pending,
    Deleted,
    Preserved,
}

#[derive(Debug)]
struct LedgerEntry {
    path: PathBuf,
    disposition: Disposition,
}

/// Tracks staged files and their disposition for one installation run.
#[derive(Debug)]
pub struct FileCleanupLedger {
    entries: Vec<LedgerEntry>,
    cleanup_on_success_only: bool,
    resolved: bool,
}

impl FileCleanupLedger {
    pub fn new(cleanup_on_success_only: bool) -> Self {
        Self {
            entries: Vec::new(),
            cleanup_on_success_only,
            resolved: false,
        }
    }

    /// Register a staged file for terminal resolution.
    pub fn register(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "registered staged file for cleanup");
        self.entries.push(LedgerEntry {
            path,
            disposition: Disposition::Pending,
        });
    }

    /// Resolution for the failure outcome. Preserves the staged files when
    /// `cleanup_on_success_only` is set, deletes them otherwise. A second
    /// resolution call is a no-op.
    pub fn restore_files(&mut self) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        if self.cleanup_on_success_only {
            for entry in &mut self.entries {
                if entry.disposition == Disposition::Pending {
                    entry.disposition = Disposition::Preserved;
                    debug!(path = %entry.path.display(), "preserving staged file for inspection");
                }
            }
        } else {
            for entry in &mut self.entries {
                delete_pending(entry);
            }
        }
    }

    /// Resolution for the success and cancellation outcomes: staged files
    /// are always deleted, silently. A second resolution call is a no-op.
    pub fn discard_files(&mut self) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        for entry in &mut self.entries {
            delete_pending(entry);
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Dispositions in registration order, for assertions and summaries.
    pub fn dispositions(&self) -> Vec<(PathBuf, Disposition)> {
        self.entries
            .iter()
            .map(|e| (e.path.clone(), e.disposition))
            .collect()
    }
}

fn delete_pending(entry: &mut LedgerEntry) {
    if entry.disposition != Disposition::Pending {
        return;
    }
    entry.disposition = Disposition::Deleted;
    if let Err(err) = remove_if_present(&entry.path) {
        // Deletion failures leave stray files behind but never fail the run.
        warn!(path = %entry.path.display(), error = %err, "failed to remove staged file");
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn staged_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, "values: {}\n").unwrap();
        path
    }

    #[test]
    fn success_resolution_deletes_staged_files() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, "staged.yaml");
        let mut ledger = FileCleanupLedger::new(true);
        ledger.register(&path);

        ledger.discard_files();
        assert!(!path.exists());
        assert_eq!(ledger.dispositions()[0].1, Disposition::Deleted);
    }

    #[test]
    fn failure_resolution_preserves_when_flag_is_set() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, "staged.yaml");
        let mut ledger = FileCleanupLedger::new(true);
        ledger.register(&path);

        ledger.restore_files();
        assert!(path.exists());
        assert_eq!(ledger.dispositions()[0].1, Disposition::Preserved);
    }

    #[test]
    fn failure_resolution_deletes_when_flag_is_unset() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, "staged.yaml");
        let mut ledger = FileCleanupLedger::new(false);
        ledger.register(&path);

        ledger.restore_files();
        assert!(!path.exists());
        assert_eq!(ledger.dispositions()[0].1, Disposition::Deleted);
    }

    #[test]
    fn second_resolution_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = staged_file(&dir, "staged.yaml");
        let mut ledger = FileCleanupLedger::new(true);
        ledger.register(&path);

        ledger.restore_files();
        assert_eq!(ledger.dispositions()[0].1, Disposition::Preserved);

        // A later success resolution must not flip the disposition.
        ledger.discard_files();
        assert!(path.exists());
        assert_eq!(ledger.dispositions()[0].1, Disposition::Preserved);
    }

    #[test]
    fn missing_file_does_not_fail_resolution() {
        let mut ledger = FileCleanupLedger::new(false);
        ledger.register("/nonexistent/staged.yaml");
        ledger.restore_files();
        assert_eq!(ledger.dispositions()[0].1, Disposition::Deleted);
    }

    #[test]
    fn empty_ledger_resolves_cleanly() {
        let mut ledger = FileCleanupLedger::new(true);
        ledger.discard_files();
        assert!(ledger.is_resolved());
    }
}
