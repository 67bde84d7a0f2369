//! Temp-file schedule store for tests

use std::sync::Arc;

use tempfile::TempDir;

use slowmode_manager::store::FileScheduleStore;

/// Fresh store on a throwaway path. Keep the `TempDir` alive for the
/// duration of the test.
pub fn temp_store() -> (TempDir, Arc<FileScheduleStore>) {
    let dir = TempDir::new().expect("create temp dir");
    let store = Arc::new(FileScheduleStore::new(dir.path().join("slowmode_config.json")));
    (dir, store)
}
