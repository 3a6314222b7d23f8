//! Classification of changes between two menu snapshots.
//!
//! Objects are matched by `name` within their type. A matched object whose
//! body differs is `changed`; an unmatched previous object is `removed`; an
//! unmatched current object is `added`. Renaming an object therefore shows up
//! as `removed` + `added` and never as `changed`.

use crate::error::Result;
use crate::snapshot::{MenuSnapshot, Objects, hash_file};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Object type whose entries reference template files.
pub const TEMPLATED_TYPE: &str = "configlets";

/// A matched object whose body changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedObject {
    /// Current name.
    pub name: String,
    /// Dotted paths of the fields that differ.
    pub fields: Vec<String>,
}

/// A template file referenced by an object whose content changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsChanged {
    /// Name of the referencing object.
    pub name: String,
    /// Template file name.
    pub file: String,
    /// Unified diff of the template text.
    pub diff: String,
}

/// A removed/added pair whose bodies are identical apart from the name.
///
/// Reported only; the pair still appears under `removed` and `added`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// Changes of one object type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectChanges {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<ChangedObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents_changed: Vec<ContentsChanged>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub renamed: Vec<Rename>,
}

impl ObjectChanges {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.changed.is_empty()
            && self.removed.is_empty()
            && self.contents_changed.is_empty()
    }
}

/// Diff result of one menu: object type to changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiffResult {
    pub types: BTreeMap<String, ObjectChanges>,
}

impl DiffResult {
    /// Whether the menu is unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.values().all(ObjectChanges::is_empty)
    }

    /// Changes of one type, if any.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&ObjectChanges> {
        self.types.get(kind)
    }

    /// Write the result as YAML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|source| crate::Error::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|e| crate::Error::io(path, e))
    }

    /// `(type, added, changed, removed, contents changed)` counts per type.
    #[must_use]
    pub fn counts(&self) -> Vec<(&str, usize, usize, usize, usize)> {
        self.types
            .iter()
            .filter(|(_, c)| !c.is_empty())
            .map(|(kind, c)| {
                (
                    kind.as_str(),
                    c.added.len(),
                    c.changed.len(),
                    c.removed.len(),
                    c.contents_changed.len(),
                )
            })
            .collect()
    }
}

/// Diff the menu at `current` against the one at `previous`.
///
/// A missing previous snapshot makes every current object `added`; a missing
/// current snapshot makes every previous object `removed`.
pub fn diff_tree(current: &Path, previous: &Path) -> Result<DiffResult> {
    let current = MenuSnapshot::load(current)?;
    let previous = MenuSnapshot::load(previous)?;
    Ok(diff_snapshots(current.as_ref(), previous.as_ref()))
}

/// Diff two loaded snapshots.
#[must_use]
pub fn diff_snapshots(current: Option<&MenuSnapshot>, previous: Option<&MenuSnapshot>) -> DiffResult {
    if let (Some(c), Some(p)) = (current, previous)
        && c.hash == p.hash
    {
        log::debug!("{}: content hash unchanged", c.dir.display());
        return DiffResult::default();
    }

    let empty = BTreeMap::new();
    let current_types = current.map_or(&empty, |s| &s.types);
    let previous_types = previous.map_or(&empty, |s| &s.types);
    let no_objects = Objects::new();

    let mut result = DiffResult::default();
    let kinds = current_types.keys().chain(previous_types.keys());
    for kind in kinds {
        if result.types.contains_key(kind) {
            continue;
        }
        let now = current_types.get(kind).unwrap_or(&no_objects);
        let before = previous_types.get(kind).unwrap_or(&no_objects);
        let mut changes = diff_objects(now, before);

        if kind == TEMPLATED_TYPE
            && let (Some(c), Some(p)) = (current, previous)
        {
            changes.contents_changed = template_changes(now, before, c, p);
        }

        if !changes.is_empty() {
            result.types.insert(kind.clone(), changes);
        }
    }
    result
}

fn diff_objects(now: &Objects, before: &Objects) -> ObjectChanges {
    let mut changes = ObjectChanges::default();

    for (name, body) in now {
        match before.get(name) {
            None => changes.added.push(name.clone()),
            Some(old) if old != body => {
                let mut fields = Vec::new();
                changed_paths("", old, body, &mut fields);
                changes.changed.push(ChangedObject {
                    name: name.clone(),
                    fields,
                });
            }
            Some(_) => {}
        }
    }
    changes.removed = before
        .keys()
        .filter(|name| !now.contains_key(*name))
        .cloned()
        .collect();

    changes.renamed = pair_renames(&changes.removed, &changes.added, now, before);
    changes
}

/// Pair removed and added objects with identical bodies apart from the name.
///
/// Each object takes part in at most one pair; candidates are matched in
/// name order.
fn pair_renames(removed: &[String], added: &[String], now: &Objects, before: &Objects) -> Vec<Rename> {
    let mut taken = vec![false; added.len()];
    let mut renames = Vec::new();
    for from in removed {
        let old = without_name(&before[from]);
        let found = added
            .iter()
            .enumerate()
            .find(|(i, to)| !taken[*i] && without_name(&now[*to]) == old);
        if let Some((i, to)) = found {
            taken[i] = true;
            renames.push(Rename {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }
    renames
}

fn without_name(value: &Value) -> Value {
    let mut value = value.clone();
    if let Value::Mapping(map) = &mut value {
        map.remove("name");
    }
    value
}

/// Collect dotted paths where `old` and `new` differ.
fn changed_paths(prefix: &str, old: &Value, new: &Value, out: &mut Vec<String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };

    match (old, new) {
        (Value::Mapping(a), Value::Mapping(b)) => {
            let mut keys: Vec<String> = a
                .keys()
                .chain(b.keys())
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                match (a.get(key.as_str()), b.get(key.as_str())) {
                    (Some(x), Some(y)) if x == y => {}
                    (Some(x), Some(y)) => changed_paths(&join(&key), x, y, out),
                    _ => out.push(join(&key)),
                }
            }
        }
        (Value::Sequence(a), Value::Sequence(b)) if a.len() == b.len() => {
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                if x != y {
                    changed_paths(&format!("{prefix}[{i}]"), x, y, out);
                }
            }
        }
        _ if old != new => out.push(if prefix.is_empty() { ".".to_string() } else { prefix.to_string() }),
        _ => {}
    }
}

/// Template files referenced by an object (`template` keys at any depth).
fn template_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, item) in map {
                match (key.as_str(), item) {
                    (Some("template" | "template_file"), Value::String(file)) => out.push(file.clone()),
                    _ => template_refs(item, out),
                }
            }
        }
        Value::Sequence(items) => items.iter().for_each(|item| template_refs(item, out)),
        _ => {}
    }
}

fn template_changes(
    now: &Objects,
    before: &Objects,
    current: &MenuSnapshot,
    previous: &MenuSnapshot,
) -> Vec<ContentsChanged> {
    let mut found = Vec::new();
    for (name, body) in now {
        if !before.contains_key(name) {
            continue;
        }
        let mut files = Vec::new();
        template_refs(body, &mut files);
        files.sort();
        files.dedup();

        for file in files {
            let new_path = current.template_path(&file);
            let old_path = previous.template_path(&file);
            if hash_file(&new_path) == hash_file(&old_path) {
                continue;
            }
            let old_text = fs::read_to_string(&old_path).unwrap_or_default();
            let new_text = fs::read_to_string(&new_path).unwrap_or_default();
            let diff = similar::TextDiff::from_lines(&old_text, &new_text)
                .unified_diff()
                .header(&format!("a/{file}"), &format!("b/{file}"))
                .to_string();
            log::debug!("Template {file} of {name} changed");
            found.push(ContentsChanged {
                name: name.clone(),
                file,
                diff,
            });
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::TEMPLATES_DIR;
    use tempfile::TempDir;

    struct Menus {
        _temp: TempDir,
        current: std::path::PathBuf,
        previous: std::path::PathBuf,
    }

    fn menus(current: &str, previous: Option<&str>) -> Menus {
        let temp = TempDir::new().unwrap();
        let cur = temp.path().join("current/design");
        let prev = temp.path().join("previous/design");
        fs::create_dir_all(cur.join(TEMPLATES_DIR)).unwrap();
        fs::write(cur.join("design.yml"), current).unwrap();
        if let Some(previous) = previous {
            fs::create_dir_all(prev.join(TEMPLATES_DIR)).unwrap();
            fs::write(prev.join("design.yml"), previous).unwrap();
        }
        Menus {
            _temp: temp,
            current: cur,
            previous: prev,
        }
    }

    #[test]
    fn test_identical_snapshots() {
        let yaml = "configlets:\n  - name: ntp\n    template: ntp.j2\n";
        let m = menus(yaml, Some(yaml));
        assert!(diff_tree(&m.current, &m.previous).unwrap().is_empty());
    }

    #[test]
    fn test_first_execution_everything_added() {
        let m = menus(
            "configlets:\n  - name: ntp\n  - name: syslog\nasn_pools:\n  - name: spines\n",
            None,
        );
        let result = diff_tree(&m.current, &m.previous).unwrap();
        assert_eq!(result.get("configlets").unwrap().added, vec!["ntp", "syslog"]);
        assert_eq!(result.get("asn_pools").unwrap().added, vec!["spines"]);
        assert!(result.types.values().all(|c| c.changed.is_empty() && c.removed.is_empty()));
    }

    #[test]
    fn test_rename_is_remove_plus_add() {
        let m = menus(
            "configlets:\n  - name: B\n    section: system\n    template: t.j2\n",
            Some("configlets:\n  - name: A\n    section: system\n    template: t.j2\n"),
        );
        let result = diff_tree(&m.current, &m.previous).unwrap();
        let configlets = result.get("configlets").unwrap();
        assert_eq!(configlets.removed, vec!["A"]);
        assert_eq!(configlets.added, vec!["B"]);
        assert!(configlets.changed.is_empty());
        assert_eq!(
            configlets.renamed,
            vec![Rename {
                from: "A".to_string(),
                to: "B".to_string()
            }]
        );
    }

    #[test]
    fn test_rename_with_other_changes_not_changed() {
        let m = menus(
            "configlets:\n  - name: B\n    section: interface\n",
            Some("configlets:\n  - name: A\n    section: system\n"),
        );
        let result = diff_tree(&m.current, &m.previous).unwrap();
        let configlets = result.get("configlets").unwrap();
        assert_eq!(configlets.removed, vec!["A"]);
        assert_eq!(configlets.added, vec!["B"]);
        assert!(configlets.changed.is_empty());
        assert!(configlets.renamed.is_empty());
    }

    #[test]
    fn test_changed_fields() {
        let m = menus(
            "ip_pools:\n  - name: lo\n    subnets: [10.0.0.0/24, 10.0.2.0/24]\n    tags: {site: a}\n",
            Some("ip_pools:\n  - name: lo\n    subnets: [10.0.0.0/24, 10.0.1.0/24]\n    tags: {site: a}\n"),
        );
        let result = diff_tree(&m.current, &m.previous).unwrap();
        let pools = result.get("ip_pools").unwrap();
        assert_eq!(
            pools.changed,
            vec![ChangedObject {
                name: "lo".to_string(),
                fields: vec!["subnets[1]".to_string()],
            }]
        );
    }

    #[test]
    fn test_simultaneous_renames_pair_by_body() {
        let m = menus(
            "configlets:\n  - name: C\n    v: 1\n  - name: D\n    v: 2\n",
            Some("configlets:\n  - name: A\n    v: 2\n  - name: B\n    v: 1\n"),
        );
        let result = diff_tree(&m.current, &m.previous).unwrap();
        let configlets = result.get("configlets").unwrap();
        assert_eq!(configlets.removed, vec!["A", "B"]);
        assert_eq!(configlets.added, vec!["C", "D"]);
        let pairs: Vec<_> = configlets
            .renamed
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A", "D"), ("B", "C")]);
    }

    #[test]
    fn test_template_contents_changed() {
        let yaml = "configlets:\n  - name: ntp\n    generators:\n      - template: ntp.j2\n";
        let m = menus(yaml, Some(yaml));
        fs::write(m.previous.join("templates/ntp.j2"), "ntp server 10.0.0.1\n").unwrap();
        fs::write(m.current.join("templates/ntp.j2"), "ntp server 10.0.0.2\n").unwrap();

        let result = diff_tree(&m.current, &m.previous).unwrap();
        let configlets = result.get("configlets").unwrap();
        assert!(configlets.changed.is_empty());
        assert_eq!(configlets.contents_changed.len(), 1);
        let entry = &configlets.contents_changed[0];
        assert_eq!(entry.name, "ntp");
        assert_eq!(entry.file, "ntp.j2");
        assert!(entry.diff.contains("-ntp server 10.0.0.1"));
        assert!(entry.diff.contains("+ntp server 10.0.0.2"));
    }

    #[test]
    fn test_removed_type() {
        let m = menus("configlets: []\n", Some("configlets: []\nproperty_sets:\n  - name: ps\n"));
        let result = diff_tree(&m.current, &m.previous).unwrap();
        assert_eq!(result.get("property_sets").unwrap().removed, vec!["ps"]);
        assert_eq!(result.counts(), vec![("property_sets", 0, 0, 1, 0)]);
    }

    #[test]
    fn test_save_yaml() {
        let m = menus("configlets:\n  - name: ntp\n", None);
        let result = diff_tree(&m.current, &m.previous).unwrap();
        let out = m.current.parent().unwrap().join("diff_design.yml");
        result.save(&out).unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert!(text.contains("configlets:"));
        assert!(text.contains("added:"));
        assert!(!text.contains("removed:"));
    }
}
