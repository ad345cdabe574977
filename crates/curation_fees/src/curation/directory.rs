//! Static curator directory: display names and payment addresses.
//!
//! Load from: env `CURATOR_DIRECTORY_PATH`, or `./config/curators.json`, or `./curators.json`.
//! File shape: `{ "0xcurator": { "name": "Alice", "paymentAddress": "0xpay" } }`.

use crate::chain::normalize::normalize_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratorEntry {
    pub name: String,
    pub payment_address: String,
}

#[derive(Clone, Debug, Default)]
pub struct CuratorDirectory {
    entries: HashMap<String, CuratorEntry>,
}

impl CuratorDirectory {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, CuratorEntry)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(addr, entry)| (normalize_id(&addr), entry))
                .collect(),
        }
    }

    /// Load from path. Returns an empty directory on error or missing file.
    pub fn load_from_path(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "curator directory unreadable");
                return Self::default();
            }
        };
        match serde_json::from_str::<HashMap<String, CuratorEntry>>(&content) {
            Ok(entries) => {
                info!(path = %path.display(), count = entries.len(), "curator directory loaded");
                Self::from_entries(entries)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "curator directory invalid");
                Self::default()
            }
        }
    }

    /// Load: env CURATOR_DIRECTORY_PATH, then ./config/curators.json, then ./curators.json.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CURATOR_DIRECTORY_PATH") {
            let p = Path::new(&path);
            if p.exists() {
                return Self::load_from_path(p);
            }
        }
        for candidate in [
            Path::new("./config/curators.json"),
            Path::new("./curators.json"),
        ] {
            if candidate.exists() {
                return Self::load_from_path(candidate);
            }
        }
        Self::default()
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, address: &str) -> Option<&CuratorEntry> {
        self.entries.get(&normalize_id(address))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn lookup_ignores_case() {
        let dir = CuratorDirectory::from_entries([(
            "0xABC".to_string(),
            CuratorEntry {
                name: "Alice".into(),
                payment_address: "0xpay".into(),
            },
        )]);
        assert_eq!(dir.lookup("0xabc").map(|e| e.name.as_str()), Some("Alice"));
        assert_eq!(dir.lookup("0xAbC").map(|e| e.name.as_str()), Some("Alice"));
        assert!(dir.lookup("0xdef").is_none());
    }

    #[test]
    fn load_json_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"{{"0xU1": {{"name": "Alice", "paymentAddress": "0xP1"}}}}"#
        )
        .unwrap();
        let dir = CuratorDirectory::load_from_path(tmp.path());
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.lookup("0xu1").unwrap().payment_address, "0xP1");
    }

    #[test]
    fn invalid_file_degrades_to_empty() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "not json").unwrap();
        assert!(CuratorDirectory::load_from_path(tmp.path()).is_empty());
        let missing = Path::new("/nonexistent/curators.json");
        assert!(CuratorDirectory::load_from_path(missing).is_empty());
    }
}
