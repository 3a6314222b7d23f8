//! Cabling map tool.
//!
//! Rewrites each blueprint's controller cabling map so interface names (and
//! optionally IPv4 addresses) follow the blueprint YAML:
//!
//! ```text
//! cabling_maps/<bp>/in_cm_<bp>.yml    pulled from the controller
//! cabling_maps/<bp>/out_cm_<bp>.yml   rewritten, pushed back
//! ```

use crate::blueprints::{self, BlueprintFile};
use crate::context::Context;
use crate::ui;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ROLE_SPINE_LEAF: &str = "spine_leaf";
const ROLE_TO_GENERIC: &str = "to_generic";

// ============================================================================
// Blueprint side
// ============================================================================

/// The link definitions of a blueprint file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BlueprintLinks {
    pub spines: Option<Vec<Spine>>,
    pub generic_systems: Option<Vec<GenericSystem>>,
}

#[derive(Debug, Deserialize)]
pub struct Spine {
    pub hostname: String,
    #[serde(default)]
    pub links: Vec<SpineLink>,
}

#[derive(Debug, Deserialize)]
pub struct SpineLink {
    pub spine_if_name: String,
    #[serde(default)]
    pub spine_ip: Option<String>,
    pub target_switch_hostname: String,
    pub target_switch_if_name: String,
    #[serde(default)]
    pub target_switch_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenericSystem {
    pub name: String,
    #[serde(default)]
    pub links: Vec<GenericLink>,
}

#[derive(Debug, Deserialize)]
pub struct GenericLink {
    pub generic_system_if_name: String,
    pub target_switch_hostname: String,
    pub target_switch_if_name: String,
}

// ============================================================================
// Controller side
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CablingMap {
    #[serde(default)]
    pub links: Vec<MapLink>,
}

#[derive(Debug, Deserialize)]
pub struct MapLink {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub endpoints: Vec<MapEndpoint>,
}

#[derive(Debug, Deserialize)]
pub struct MapEndpoint {
    #[serde(default)]
    pub system: Option<MapSystem>,
    pub interface: MapInterface,
}

#[derive(Debug, Deserialize)]
pub struct MapSystem {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MapInterface {
    pub id: String,
    #[serde(default)]
    pub if_name: Option<String>,
}

impl MapLink {
    /// The two endpoint labels, when the link has exactly two
    fn labels(&self) -> Option<(&str, &str)> {
        match self.endpoints.as_slice() {
            [a, b] => Some((label(a), label(b))),
            _ => None,
        }
    }

    fn interface_ids(&self) -> (String, String) {
        (
            self.endpoints[0].interface.id.clone(),
            self.endpoints[1].interface.id.clone(),
        )
    }
}

fn label(endpoint: &MapEndpoint) -> &str {
    endpoint
        .system
        .as_ref()
        .and_then(|s| s.label.as_deref())
        .unwrap_or("")
}

/// Body of the cabling map update
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct UpdatedMap {
    pub links: Vec<UpdatedLink>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct UpdatedLink {
    pub endpoints: Vec<UpdatedEndpoint>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct UpdatedEndpoint {
    pub interface: UpdatedInterface,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct UpdatedInterface {
    pub id: String,
    pub if_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<String>,
}

fn endpoint(id: String, if_name: &str, ipv4_addr: Option<&String>) -> UpdatedEndpoint {
    UpdatedEndpoint {
        interface: UpdatedInterface {
            id,
            if_name: if_name.to_string(),
            ipv4_addr: ipv4_addr.cloned(),
        },
    }
}

// ============================================================================
// Rewrite
// ============================================================================

/// Rewrite a pulled map from the blueprint's links.
///
/// Endpoint order follows the pulled map. Each controller link is assigned
/// at most once. `None` when the blueprint defines neither spines nor
/// generic systems.
pub fn rewrite(map: &CablingMap, blueprint: &BlueprintLinks) -> Option<UpdatedMap> {
    if blueprint.spines.is_none() && blueprint.generic_systems.is_none() {
        return None;
    }
    let mut used = vec![false; map.links.len()];
    let mut out = UpdatedMap::default();

    for spine in blueprint.spines.iter().flatten() {
        for link in &spine.links {
            let leaf = link.target_switch_hostname.as_str();
            let found = claim(map, &mut used, ROLE_SPINE_LEAF, |cm| {
                cm.labels()
                    .is_some_and(|(a, b)| (a == spine.hostname && b == leaf) || (a == leaf && b == spine.hostname))
            });
            let Some(cm) = found else {
                log::warn!("No cabling map link {} <> {leaf}", spine.hostname);
                continue;
            };

            let addresses = link.spine_ip.as_ref().zip(link.target_switch_ip.as_ref());
            let spine_side = (link.spine_if_name.as_str(), addresses.map(|(s, _)| s));
            let leaf_side = (link.target_switch_if_name.as_str(), addresses.map(|(_, l)| l));
            let (first, second) = if label(&cm.endpoints[0]) == spine.hostname {
                (spine_side, leaf_side)
            } else {
                (leaf_side, spine_side)
            };
            let (id0, id1) = cm.interface_ids();
            out.links.push(UpdatedLink {
                endpoints: vec![endpoint(id0, first.0, first.1), endpoint(id1, second.0, second.1)],
            });
        }
    }

    for system in blueprint.generic_systems.iter().flatten() {
        for link in &system.links {
            let leaf = link.target_switch_hostname.as_str();
            let leaf_if = link.target_switch_if_name.as_str();
            let found = claim(map, &mut used, ROLE_TO_GENERIC, |cm| {
                let Some((a, b)) = cm.labels() else {
                    return false;
                };
                let if_name = |i: usize| cm.endpoints[i].interface.if_name.as_deref();
                (a == system.name && b == leaf && if_name(1) == Some(leaf_if))
                    || (a == leaf && b == system.name && if_name(0) == Some(leaf_if))
            });
            let Some(cm) = found else {
                log::warn!("No cabling map link {} <> {leaf}:{leaf_if}", system.name);
                continue;
            };

            let gs_if = link.generic_system_if_name.as_str();
            let (first, second) = if label(&cm.endpoints[0]) == system.name {
                (gs_if, leaf_if)
            } else {
                (leaf_if, gs_if)
            };
            let (id0, id1) = cm.interface_ids();
            out.links.push(UpdatedLink {
                endpoints: vec![endpoint(id0, first, None), endpoint(id1, second, None)],
            });
        }
    }

    Some(out)
}

fn claim<'a, F>(map: &'a CablingMap, used: &mut [bool], role: &str, matches: F) -> Option<&'a MapLink>
where
    F: Fn(&MapLink) -> bool,
{
    let index = map
        .links
        .iter()
        .enumerate()
        .position(|(i, cm)| !used[i] && cm.role == role && matches(cm))?;
    used[index] = true;
    Some(&map.links[index])
}

// ============================================================================
// Tool
// ============================================================================

fn map_dir(ctx: &Context, label: &str) -> PathBuf {
    ctx.layout.cabling_maps_dir().join(label)
}

pub fn pulled_file(ctx: &Context, label: &str) -> PathBuf {
    map_dir(ctx, label).join(format!("in_cm_{label}.yml"))
}

pub fn rewritten_file(ctx: &Context, label: &str) -> PathBuf {
    map_dir(ctx, label).join(format!("out_cm_{label}.yml"))
}

/// Pull, rewrite and push the cabling maps of every blueprint in scope.
///
/// Returns the labels whose map was rewritten.
pub fn run(ctx: &Context, pull: bool, push: bool) -> Result<Vec<String>> {
    ui::header(&format!("Cabling maps of {}", ctx.scope));
    let files = blueprints::load_all(&ctx.blueprints_dir())?;
    if files.is_empty() {
        ui::warn("No blueprints in scope");
        return Ok(Vec::new());
    }

    if pull {
        ui::section("Pulling");
        for file in &files {
            pull_one(ctx, file)?;
        }
    }

    ui::section("Rewriting");
    let mut updated = Vec::new();
    for file in &files {
        if rewrite_one(ctx, file)? {
            updated.push(file.label.clone());
        }
    }

    if push && !updated.is_empty() {
        ui::section("Pushing");
        let client = ctx.client()?;
        for label in &updated {
            let content = read(&rewritten_file(ctx, label))?;
            let body: serde_json::Value = serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid rewritten map for {label}"))?;
            let id = client.blueprint_id(label)?;
            let pb = ui::spinner(&format!("Updating cabling map of {label}"));
            match client.update_cabling_map(&id, body) {
                Ok(()) => ui::finish_success(&pb, &format!("Updated {label}")),
                Err(e) => {
                    ui::finish_error(&pb, &format!("Update of {label} failed"));
                    return Err(e).with_context(|| format!("Failed to push cabling map of {label}"));
                }
            }
        }
    }

    Ok(updated)
}

fn pull_one(ctx: &Context, file: &BlueprintFile) -> Result<()> {
    let client = ctx.client()?;
    let id = client.blueprint_id(&file.label)?;
    let map = client
        .cabling_map(&id)
        .with_context(|| format!("Failed to pull cabling map of {}", file.label))?;
    let path = pulled_file(ctx, &file.label);
    write(&path, &serde_yaml::to_string(&map)?)?;
    ui::success(&format!("Pulled {}", path.display()));
    Ok(())
}

fn rewrite_one(ctx: &Context, file: &BlueprintFile) -> Result<bool> {
    let links: BlueprintLinks = serde_yaml::from_value(file.document.clone())
        .with_context(|| format!("Invalid links in {}", file.path.display()))?;
    if links.spines.is_none() && links.generic_systems.is_none() {
        ui::dim(&format!("{}: no spines or generic systems, skipped", file.label));
        return Ok(false);
    }

    let pulled = pulled_file(ctx, &file.label);
    let map: CablingMap = serde_yaml::from_str(&read(&pulled)?)
        .with_context(|| format!("Invalid cabling map: {}", pulled.display()))?;
    let Some(updated) = rewrite(&map, &links) else {
        return Ok(false);
    };

    let path = rewritten_file(ctx, &file.label);
    write(&path, &serde_yaml::to_string(&updated)?)?;
    ui::success(&format!("{}: {} link(s) -> {}", file.label, updated.links.len(), path.display()));
    Ok(true)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::Layout;
    use crate::plan::{PlanRun, PlanTool};
    use crate::prompt::AutoAnswer;
    use crate::scope::ResolvedScope;
    use crate::settings::Settings;
    use crate::cli::CommandAlias;
    use apstra::{Client, Credentials, Method, MockTransport};
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn pulled() -> Value {
        json!({"links": [
            {"role": "spine_leaf", "endpoints": [
                {"system": {"label": "spine1"}, "interface": {"id": "i1", "if_name": "et-0/0/0"}},
                {"system": {"label": "leaf1"}, "interface": {"id": "i2", "if_name": "et-0/0/48"}}
            ]},
            {"role": "spine_leaf", "endpoints": [
                {"system": {"label": "leaf2"}, "interface": {"id": "i3", "if_name": "et-0/0/48"}},
                {"system": {"label": "spine1"}, "interface": {"id": "i4", "if_name": "et-0/0/1"}}
            ]},
            {"role": "to_generic", "endpoints": [
                {"system": {"label": "leaf1"}, "interface": {"id": "i5", "if_name": "xe-0/0/3"}},
                {"system": {"label": "srv1"}, "interface": {"id": "i6", "if_name": "eth0"}}
            ]},
            {"role": "to_generic", "endpoints": [
                {"system": {"label": "leaf1"}, "interface": {"id": "i7", "if_name": "xe-0/0/4"}},
                {"system": {"label": "srv1"}, "interface": {"id": "i8", "if_name": "eth1"}}
            ]}
        ]})
    }

    const BLUEPRINT: &str = "
spines:
  - hostname: spine1
    links:
      - spine_if_name: et-0/0/10
        spine_ip: 10.0.0.0/31
        target_switch_hostname: leaf1
        target_switch_if_name: et-0/0/50
        target_switch_ip: 10.0.0.1/31
      - spine_if_name: et-0/0/11
        spine_ip: 10.0.0.2/31
        target_switch_hostname: leaf2
        target_switch_if_name: et-0/0/51
generic_systems:
  - name: srv1
    links:
      - generic_system_if_name: bond0-a
        target_switch_hostname: leaf1
        target_switch_if_name: xe-0/0/4
";

    fn interfaces(map: &UpdatedMap) -> Vec<Vec<(&str, &str, Option<&str>)>> {
        map.links
            .iter()
            .map(|l| {
                l.endpoints
                    .iter()
                    .map(|e| {
                        let i = &e.interface;
                        (i.id.as_str(), i.if_name.as_str(), i.ipv4_addr.as_deref())
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_rewrite_follows_blueprint() {
        let map: CablingMap = serde_json::from_value(pulled()).unwrap();
        let links: BlueprintLinks = serde_yaml::from_str(BLUEPRINT).unwrap();
        let out = rewrite(&map, &links).unwrap();

        assert_eq!(
            interfaces(&out),
            vec![
                vec![
                    ("i1", "et-0/0/10", Some("10.0.0.0/31")),
                    ("i2", "et-0/0/50", Some("10.0.0.1/31")),
                ],
                // Leaf first in the pulled map; no leaf address, so none at all
                vec![("i3", "et-0/0/51", None), ("i4", "et-0/0/11", None)],
                vec![("i7", "xe-0/0/4", None), ("i8", "bond0-a", None)],
            ]
        );
    }

    #[test]
    fn test_rewrite_assigns_parallel_links_once() {
        let map: CablingMap = serde_json::from_value(json!({"links": [
            {"role": "spine_leaf", "endpoints": [
                {"system": {"label": "spine1"}, "interface": {"id": "a1"}},
                {"system": {"label": "leaf1"}, "interface": {"id": "a2"}}
            ]},
            {"role": "spine_leaf", "endpoints": [
                {"system": {"label": "spine1"}, "interface": {"id": "b1"}},
                {"system": {"label": "leaf1"}, "interface": {"id": "b2"}}
            ]}
        ]}))
        .unwrap();
        let links: BlueprintLinks = serde_yaml::from_str(
            "
spines:
  - hostname: spine1
    links:
      - {spine_if_name: s0, target_switch_hostname: leaf1, target_switch_if_name: l0}
      - {spine_if_name: s1, target_switch_hostname: leaf1, target_switch_if_name: l1}
      - {spine_if_name: s2, target_switch_hostname: leaf1, target_switch_if_name: l2}
",
        )
        .unwrap();

        let out = rewrite(&map, &links).unwrap();
        assert_eq!(
            interfaces(&out),
            vec![
                vec![("a1", "s0", None), ("a2", "l0", None)],
                vec![("b1", "s1", None), ("b2", "l1", None)],
            ]
        );
    }

    #[test]
    fn test_rewrite_skips_blueprint_without_links() {
        let map: CablingMap = serde_json::from_value(pulled()).unwrap();
        let links: BlueprintLinks = serde_yaml::from_str("name: dc1\nleafs: []\n").unwrap();
        assert!(rewrite(&map, &links).is_none());
    }

    #[test]
    fn test_ipv4_omitted_from_yaml_when_absent() {
        let map = UpdatedMap {
            links: vec![UpdatedLink {
                endpoints: vec![endpoint("i1".to_string(), "et-0/0/0", None)],
            }],
        };
        let yaml = serde_yaml::to_string(&map).unwrap();
        assert!(yaml.contains("if_name: et-0/0/0"));
        assert!(!yaml.contains("ipv4_addr"));
    }

    struct NoPlanTool;

    impl PlanTool for NoPlanTool {
        fn command(&self, _run: &PlanRun<'_>, _alias: CommandAlias) -> Result<bool> {
            anyhow::bail!("not used")
        }
        fn plan(&self, _run: &PlanRun<'_>, _destroy: bool) -> Result<bool> {
            anyhow::bail!("not used")
        }
        fn show(&self, _run: &PlanRun<'_>) -> Result<Value> {
            anyhow::bail!("not used")
        }
        fn apply(&self, _run: &PlanRun<'_>) -> Result<bool> {
            anyhow::bail!("not used")
        }
    }

    fn context(home: &Path, mock: &MockTransport) -> Context {
        let scope = ResolvedScope {
            target: "lab".to_string(),
            customer: "acme".to_string(),
            domain: "dc1".to_string(),
            project: "fabric".to_string(),
        };
        let client = Client::new(Box::new(mock.clone()), Credentials::new("admin", "admin"));
        Context::new(
            Layout::new(home),
            Settings::default(),
            scope,
            Box::new(AutoAnswer),
            Box::new(NoPlanTool),
        )
        .with_client(client)
    }

    #[test]
    fn test_pull_rewrite_push() {
        let temp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        mock.respond(Method::Post, "/api/aaa/login", 201, json!({"token": "t"}));
        mock.respond(
            Method::Get,
            "/api/blueprints",
            200,
            json!({"items": [{"id": "bp-1", "label": "dc1"}, {"id": "bp-2", "label": "dc2"}]}),
        );
        let route = "/api/blueprints/bp-1/experience/web/cabling-map";
        mock.respond(Method::Get, route, 200, pulled());
        mock.respond(Method::Patch, route, 200, json!({}));
        mock.respond(
            Method::Get,
            "/api/blueprints/bp-2/experience/web/cabling-map",
            200,
            json!({"links": []}),
        );

        let ctx = context(temp.path(), &mock);
        let bp_dir = ctx.blueprints_dir();
        fs::create_dir_all(&bp_dir).unwrap();
        fs::write(bp_dir.join("dc1.yml"), BLUEPRINT).unwrap();
        fs::write(bp_dir.join("dc2.yml"), "leafs: []\n").unwrap();

        let updated = run(&ctx, true, true).unwrap();

        assert_eq!(updated, vec!["dc1".to_string()]);
        assert!(pulled_file(&ctx, "dc2").exists());
        assert!(!rewritten_file(&ctx, "dc2").exists());
        let written = fs::read_to_string(rewritten_file(&ctx, "dc1")).unwrap();
        assert!(written.contains("bond0-a"));

        let patch = mock
            .calls()
            .into_iter()
            .find(|r| r.method == Method::Patch)
            .unwrap();
        assert_eq!(patch.path, route);
        assert_eq!(patch.body.unwrap()["links"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_rewrite_without_pull_needs_local_map() {
        let temp = TempDir::new().unwrap();
        let mock = MockTransport::new();
        let ctx = context(temp.path(), &mock);
        fs::create_dir_all(ctx.blueprints_dir()).unwrap();
        fs::write(ctx.blueprints_dir().join("dc1.yml"), BLUEPRINT).unwrap();

        assert!(run(&ctx, false, false).is_err());
        assert!(mock.calls().is_empty());
    }
}
