use std::path::{Path, PathBuf};

use traffic_violations_core::DatabaseSettings;
use ulid::Ulid;

/// Throwaway database file, removed with its WAL side files on drop.
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "traffic-violations-{}-{}.sqlite3",
            name,
            Ulid::new()
        ));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> DatabaseSettings {
        DatabaseSettings {
            path: self.path.clone(),
        }
    }

    /// A path whose parent directory does not exist.
    pub fn unreachable_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("traffic-violations-missing-{}", Ulid::new()))
            .join("nested")
            .join("violations.sqlite3")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut target = self.path.clone().into_os_string();
            target.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(target));
        }
    }
}

pub fn fixture_values() -> Vec<String> {
    [
        "ABC123",
        "Jane Doe",
        "Speeding in school zone",
        "No",
        "No",
        "No",
        "No",
        "No",
        "MD",
        "02 - Automobile",
        "2023",
        "TOYOTA",
        "COROLLA",
        "SILVER",
        "21-801.1",
        "150.00",
        "No",
        "WHITE",
        "F",
        "ROCKVILLE",
        "MD",
        "MD",
        "A - Marked Patrol",
        "Citation",
    ]
    .iter()
    .map(|value| (*value).to_string())
    .collect()
}
