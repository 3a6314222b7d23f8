use crate::paths;
use anyhow::{Context, Result};
use apstra::PollPolicy;
use executions::CommitAction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_USERNAME: &str = "APSTRA_USERNAME";
pub const ENV_PASSWORD: &str = "APSTRA_PASSWORD";
pub const ENV_TERRAFORM: &str = "APAF_TERRAFORM";

// ============================================================================
// Settings
// ============================================================================

/// Repository-wide settings (`settings.yml`)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Controllers by target name
    pub targets: BTreeMap<String, TargetSettings>,
    pub terraform: TerraformSettings,
    pub executions: ExecutionSettings,
    pub commit: CommitSettings,
    pub polling: PollingSettings,
    /// Non-declarative menus, relative to the project input tree
    pub menus: Menus,
    /// Map failed outcomes to a non-zero process status
    pub strict_exit_status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Accept self-signed certificates
    #[serde(default = "default_true")]
    pub insecure: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerraformSettings {
    pub binary: String,
    /// Working directory, default `<home>/terraform`
    pub working_dir: Option<String>,
}

impl Default for TerraformSettings {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Historical executions kept per project
    pub retention: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            retention: executions::DEFAULT_RETENTION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitSettings {
    /// Post-apply action; asked interactively when unset
    pub action: Option<CommitAction>,
    pub comment: String,
    pub max_permanent_revisions: usize,
    /// Run a commit-check after deploying
    pub commit_check: bool,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            action: None,
            comment: "apaf".to_string(),
            max_permanent_revisions: apstra::DEFAULT_MAX_PERMANENT_REVISIONS,
            commit_check: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub initial_attempts: u32,
    pub initial_delay_secs: u64,
    pub poll_attempts: u32,
    pub poll_delay_secs: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        let policy = PollPolicy::default();
        Self {
            initial_attempts: policy.initial_attempts,
            initial_delay_secs: policy.initial_delay.as_secs(),
            poll_attempts: policy.poll_attempts,
            poll_delay_secs: policy.poll_delay.as_secs(),
        }
    }
}

impl PollingSettings {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            initial_attempts: self.initial_attempts,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            poll_attempts: self.poll_attempts,
            poll_delay: Duration::from_secs(self.poll_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Menus(pub Vec<String>);

impl Default for Menus {
    fn default() -> Self {
        Self(vec!["resources".to_string(), "design".to_string()])
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    60
}

impl Settings {
    /// Load settings, or defaults when the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Apply environment overrides
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(binary) = lookup(ENV_TERRAFORM) {
            self.terraform.binary = binary;
        }
        let username = lookup(ENV_USERNAME);
        let password = lookup(ENV_PASSWORD);
        for target in self.targets.values_mut() {
            if let Some(user) = &username {
                target.username = Some(user.clone());
            }
            if let Some(pass) = &password {
                target.password = Some(pass.clone());
            }
        }
    }

    pub fn target(&self, name: &str) -> Result<&TargetSettings> {
        self.targets.get(name).with_context(|| {
            format!(
                "Unknown target '{name}'. Known targets: {}",
                self.targets.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    pub fn terraform_dir(&self, home: &Path) -> PathBuf {
        self.terraform
            .working_dir
            .as_deref()
            .map_or_else(|| home.join("terraform"), paths::expand)
    }
}

impl TargetSettings {
    pub fn credentials(&self) -> Result<apstra::Credentials> {
        let username = self
            .username
            .as_deref()
            .with_context(|| format!("No username for {} (set {ENV_USERNAME})", self.url))?;
        let password = self
            .password
            .as_deref()
            .with_context(|| format!("No password for {} (set {ENV_PASSWORD})", self.url))?;
        Ok(apstra::Credentials::new(username, password))
    }
}

// ============================================================================
// Tests
// ============================================================================
