//! Loading a menu directory into typed, name-keyed objects.

use crate::error::{Error, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Subdirectory holding template files referenced by objects.
pub const TEMPLATES_DIR: &str = "templates";

/// Objects of one type, keyed by name.
pub type Objects = BTreeMap<String, Value>;

/// One non-declarative menu loaded from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuSnapshot {
    /// Menu directory.
    pub dir: PathBuf,
    /// Objects per object type.
    pub types: BTreeMap<String, Objects>,
    /// Content hash of every file in the menu, templates included.
    pub hash: String,
}

impl MenuSnapshot {
    /// Load every `*.yml`/`*.yaml` file of `dir`.
    ///
    /// Returns `None` when the directory does not exist.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut types = BTreeMap::new();
        for path in yaml_files(dir)? {
            let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            let value: Value = serde_yaml::from_str(&content).map_err(|source| Error::Yaml {
                path: path.clone(),
                source,
            })?;
            let mapping = match value {
                Value::Mapping(mapping) => mapping,
                Value::Null => continue,
                _ => return Err(Error::NotAMapping(path)),
            };

            for (key, body) in mapping {
                let Some(kind) = key.as_str() else {
                    log::warn!("Ignoring non-string object type in {}", path.display());
                    continue;
                };
                if types.contains_key(kind) {
                    return Err(Error::DuplicateType {
                        kind: kind.to_string(),
                        path,
                    });
                }
                types.insert(kind.to_string(), objects(kind, body, &path)?);
            }
        }

        Ok(Some(Self {
            dir: dir.to_path_buf(),
            types,
            hash: hash_tree(dir)?,
        }))
    }

    /// Path of a template file referenced by an object.
    #[must_use]
    pub fn template_path(&self, file: &str) -> PathBuf {
        self.dir.join(TEMPLATES_DIR).join(file)
    }
}

/// Extract name-keyed objects from a type body.
///
/// Accepts a list of mappings carrying `name`, or a mapping of name to body
/// (the key becomes the name). Names must be unique within a type.
fn objects(kind: &str, body: Value, path: &Path) -> Result<Objects> {
    let mut objects = Objects::new();
    match body {
        Value::Sequence(items) => {
            for item in items {
                let Some(name) = item.get("name").and_then(Value::as_str).map(str::to_string) else {
                    log::warn!("Ignoring {kind} entry without a name");
                    continue;
                };
                if objects.contains_key(&name) {
                    return Err(Error::DuplicateName {
                        kind: kind.to_string(),
                        name,
                        path: path.to_path_buf(),
                    });
                }
                objects.insert(name, item);
            }
        }
        Value::Mapping(map) => {
            for (key, mut item) in map {
                let Some(name) = key.as_str() else { continue };
                if let Value::Mapping(m) = &mut item
                    && !m.contains_key("name")
                {
                    m.insert(Value::from("name"), Value::from(name));
                }
                objects.insert(name.to_string(), item);
            }
        }
        Value::Null => {}
        _ => log::warn!("Ignoring {kind}: expected a list or a mapping"),
    }
    Ok(objects)
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Hash every file under `dir` in path order. Symlinks are not followed.
fn hash_tree(dir: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let content = fs::read(path).map_err(|e| Error::io(path, e))?;
        let relative = path.strip_prefix(dir).unwrap_or(path);
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(&content);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash one file, `None` when it cannot be read.
#[must_use]
pub fn hash_file(path: &Path) -> Option<String> {
    let content = fs::read(path).ok()?;
    Some(blake3::hash(&content).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_merges_files_and_shapes() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("configlets.yml"),
            "configlets:\n  - name: ntp\n    template: ntp.j2\n",
        )
        .unwrap();
        fs::write(
            temp.path().join("pools.yaml"),
            "asn_pools:\n  spines:\n    ranges: [[64512, 64520]]\n",
        )
        .unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let snap = MenuSnapshot::load(temp.path()).unwrap().unwrap();
        assert_eq!(snap.types.len(), 2);
        assert!(snap.types["configlets"].contains_key("ntp"));
        let spines = &snap.types["asn_pools"]["spines"];
        assert_eq!(spines.get("name").and_then(Value::as_str), Some("spines"));
    }

    #[test]
    fn test_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(MenuSnapshot::load(&temp.path().join("design")).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.yml"), "configlets: []\n").unwrap();
        fs::write(temp.path().join("b.yml"), "configlets: []\n").unwrap();
        assert!(matches!(
            MenuSnapshot::load(temp.path()),
            Err(Error::DuplicateType { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("configlets.yml"),
            "configlets:\n  - name: ntp\n    template: a.j2\n  - name: ntp\n    template: b.j2\n",
        )
        .unwrap();
        match MenuSnapshot::load(temp.path()) {
            Err(Error::DuplicateName { kind, name, .. }) => {
                assert_eq!(kind, "configlets");
                assert_eq!(name, "ntp");
            }
            other => panic!("expected a duplicate name error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_hash_skips_symlink_loops() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(TEMPLATES_DIR)).unwrap();
        fs::write(temp.path().join("configlets.yml"), "configlets: []\n").unwrap();
        fs::write(temp.path().join("templates/ntp.j2"), "ntp server 1\n").unwrap();
        let before = MenuSnapshot::load(temp.path()).unwrap().unwrap().hash;

        std::os::unix::fs::symlink("..", temp.path().join("templates/loop")).unwrap();
        let after = MenuSnapshot::load(temp.path()).unwrap().unwrap().hash;
        assert_eq!(before, after);
    }

    #[test]
    fn test_hash_covers_templates() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(TEMPLATES_DIR)).unwrap();
        fs::write(temp.path().join("configlets.yml"), "configlets: []\n").unwrap();
        fs::write(temp.path().join("templates/ntp.j2"), "ntp server 1\n").unwrap();
        let before = MenuSnapshot::load(temp.path()).unwrap().unwrap().hash;

        fs::write(temp.path().join("templates/ntp.j2"), "ntp server 2\n").unwrap();
        let after = MenuSnapshot::load(temp.path()).unwrap().unwrap().hash;
        assert_ne!(before, after);
    }
}
