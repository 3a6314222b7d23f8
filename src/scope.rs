//! Target/customer/domain/project selection, persisted in `scope.yml`.
//!
//! The levels form a hierarchy: changing one level clears every level below
//! it. The file is rewritten on every mutation.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scope {
    pub target: Option<String>,
    pub customer: Option<String>,
    pub domain: Option<String>,
    pub project: Option<String>,
}

impl Scope {
    pub fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::Target => self.target.as_deref(),
            Level::Customer => self.customer.as_deref(),
            Level::Domain => self.domain.as_deref(),
            Level::Project => self.project.as_deref(),
        }
    }
}

/// A scope with every level selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub target: String,
    pub customer: String,
    pub domain: String,
    pub project: String,
}

impl ResolvedScope {
    /// `customer_domain_project`, used for archive names
    pub fn label(&self) -> String {
        format!("{}_{}_{}", self.customer, self.domain, self.project)
    }
}

impl std::fmt::Display for ResolvedScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}/{}", self.target, self.customer, self.domain, self.project)
    }
}

/// Level of the scope hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Target,
    Customer,
    Domain,
    Project,
}

/// `scope.yml` together with its location
#[derive(Debug)]
pub struct ScopeFile {
    path: PathBuf,
    scope: Scope,
}

impl ScopeFile {
    /// Load the scope, or an empty one when the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        let scope = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read scope: {}", path.display()))?;
            serde_yaml::from_str::<Option<Scope>>(&content)
                .with_context(|| format!("Invalid scope file: {}", path.display()))?
                .unwrap_or_default()
        } else {
            Scope::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            scope,
        })
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Set one level, clearing the levels below it when the value changes
    pub fn set(&mut self, level: Level, value: &str) -> Result<()> {
        validate_segment(value)?;
        let slot = match level {
            Level::Target => &mut self.scope.target,
            Level::Customer => &mut self.scope.customer,
            Level::Domain => &mut self.scope.domain,
            Level::Project => &mut self.scope.project,
        };
        if slot.as_deref() == Some(value) {
            return Ok(());
        }
        *slot = Some(value.to_string());

        match level {
            Level::Target => {
                self.scope.customer = None;
                self.scope.domain = None;
                self.scope.project = None;
            }
            Level::Customer => {
                self.scope.domain = None;
                self.scope.project = None;
            }
            Level::Domain => self.scope.project = None,
            Level::Project => {}
        }
        log::debug!("Scope {level:?} set to {value}");
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(&self.scope).context("Failed to serialize scope")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write scope: {}", self.path.display()))
    }

    /// The scope with every level set
    pub fn resolve(&self) -> Result<ResolvedScope> {
        let missing = |name: &str| {
            format!("No {name} selected. Pass {name}=<value> or run without a command to pick one.")
        };
        let scope = &self.scope;
        Ok(ResolvedScope {
            target: scope.target.clone().with_context(|| missing("target"))?,
            customer: scope.customer.clone().with_context(|| missing("customer"))?,
            domain: scope.domain.clone().with_context(|| missing("domain"))?,
            project: scope.project.clone().with_context(|| missing("project"))?,
        })
    }
}

/// Scope values become directory names
fn validate_segment(value: &str) -> Result<()> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '\\']) {
        bail!("Invalid scope value '{value}'");
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
