//! Centralized path resolution for apaf
//!
//! Everything lives below one repository root, the apaf home.
//!
//! # Environment Variables
//!
//! - `APAF_HOME` - Override the repository root
//!
//! # Path Resolution Priority
//!
//! For home_dir():
//! 1. `APAF_HOME` environment variable
//! 2. The current directory, when it holds `settings.yml`
//! 3. `~/apaf`

use crate::scope::ResolvedScope;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the repository root override
pub const ENV_HOME: &str = "APAF_HOME";

pub const SETTINGS_FILE: &str = "settings.yml";
pub const SCOPE_FILE: &str = "scope.yml";

/// Resolve the repository root
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_HOME) {
        let path = expand(&dir);
        log::debug!("Using home from {}: {}", ENV_HOME, path.display());
        return Ok(path);
    }

    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    if cwd.join(SETTINGS_FILE).exists() {
        log::debug!("Using current directory as home: {}", cwd.display());
        return Ok(cwd);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join("apaf");
    log::debug!("Using default home: {}", path.display());
    Ok(path)
}

/// Locations below the repository root
#[derive(Debug, Clone)]
pub struct Layout {
    home: PathBuf,
}

impl Layout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn settings_file(&self) -> PathBuf {
        self.home.join(SETTINGS_FILE)
    }

    pub fn scope_file(&self) -> PathBuf {
        self.home.join(SCOPE_FILE)
    }

    pub fn projects_dir(&self) -> PathBuf {
        self.home.join("projects")
    }

    pub fn executions_dir(&self) -> PathBuf {
        self.home.join("executions")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.home.join("archive")
    }

    pub fn cabling_maps_dir(&self) -> PathBuf {
        self.home.join("cabling_maps")
    }

    /// Live input tree of a project
    pub fn project_input(&self, scope: &ResolvedScope) -> PathBuf {
        self.projects_dir()
            .join(&scope.customer)
            .join(&scope.domain)
            .join(&scope.project)
    }

    /// Blueprint definitions of a project
    pub fn blueprints_dir(&self, scope: &ResolvedScope) -> PathBuf {
        self.project_input(scope).join("blueprints")
    }

    /// Execution history root of a project
    pub fn execution_root(&self, scope: &ResolvedScope) -> PathBuf {
        self.executions_dir()
            .join(&scope.customer)
            .join(&scope.domain)
            .join(&scope.project)
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
