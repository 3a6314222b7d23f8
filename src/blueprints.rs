//! Blueprint definitions in a project's input tree.

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// One `blueprints/<bp>.yml` file
#[derive(Debug, Clone, PartialEq)]
pub struct BlueprintFile {
    /// Blueprint label on the controller
    pub label: String,
    pub path: PathBuf,
    /// Owning parent project, when inherited
    pub inherited_from: Option<String>,
    pub document: Value,
}

impl BlueprintFile {
    /// Created by this project rather than a parent
    pub fn is_local(&self) -> bool {
        self.inherited_from.is_none()
    }
}

/// Load every blueprint file, sorted by label. A missing directory is empty.
pub fn load_all(dir: &Path) -> Result<Vec<BlueprintFile>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");
        if !is_yaml || !path.is_file() {
            continue;
        }
        found.push(load(&path)?);
    }
    found.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(found)
}

fn load(path: &Path) -> Result<BlueprintFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid blueprint file: {}", path.display()))?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label = document
        .get("name")
        .and_then(Value::as_str)
        .map_or(stem, str::to_string);
    let inherited_from = document
        .get("inherited_from")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(BlueprintFile {
        label,
        path: path.to_path_buf(),
        inherited_from,
        document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_all() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("dc2.yml"), "inherited_from: core\nspines: []\n").unwrap();
        fs::write(temp.path().join("dc1.yml"), "spines: []\n").unwrap();
        fs::write(temp.path().join("named.yaml"), "name: dc-east\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let all = load_all(temp.path()).unwrap();
        let labels: Vec<_> = all.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["dc-east", "dc1", "dc2"]);
        assert!(all[1].is_local());
        assert_eq!(all[2].inherited_from.as_deref(), Some("core"));
    }

    #[test]
    fn test_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(load_all(&temp.path().join("blueprints")).unwrap().is_empty());
    }
}
