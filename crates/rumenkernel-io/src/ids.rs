//! Output-ID scraping.
//!
//! Pairs result file names with the animal-ID prefix they start with, so
//! downstream tooling can match outputs back to loggers.

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Default number of leading characters that form an animal id.
pub const DEFAULT_PREFIX_LEN: usize = 5;

/// A result file and the animal id it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct OutputId {
    /// File name within the directory.
    pub file_name: String,
    /// First `prefix_len` characters of the file name.
    pub animal_id: String,
}

/// List the regular files in `dir`, sorted by name, with their id prefixes.
pub fn scrape_ids(dir: impl AsRef<Path>, prefix_len: usize) -> Result<Vec<OutputId>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        ids.push(OutputId {
            animal_id: file_name.chars().take(prefix_len).collect(),
            file_name,
        });
    }
    ids.sort();
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_ids() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["S0013_cosinor_features.csv", "S0012_drinking_behavior.csv", "S1.csv"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let ids = scrape_ids(dir.path(), DEFAULT_PREFIX_LEN).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].file_name, "S0012_drinking_behavior.csv");
        assert_eq!(ids[0].animal_id, "S0012");
        assert_eq!(ids[1].animal_id, "S0013");
        // Short names keep what they have.
        assert_eq!(ids[2].animal_id, "S1.cs");
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scrape_ids(dir.path().join("absent"), 5).is_err());
    }
}
