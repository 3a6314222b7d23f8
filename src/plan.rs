//! Driver for the external plan tool (Terraform).
//!
//! Every invocation runs against the project's working directory with the
//! execution's own state file. Output is echoed and persisted line by line
//! under the execution's `logs/`.

use crate::cli::CommandAlias;
use crate::runner;
use crate::ui;
use anyhow::{Context, Result, bail};
use executions::ExecutionPaths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

static ANSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap_or_else(|_| unreachable!("static pattern"))
});

/// Where a plan-tool invocation runs
pub struct PlanRun<'a> {
    pub working_dir: &'a Path,
    /// Live input tree of the project
    pub input_dir: &'a Path,
    pub execution: &'a ExecutionPaths,
}

pub trait PlanTool {
    /// Run a read-only command. Returns whether it succeeded.
    fn command(&self, run: &PlanRun<'_>, alias: CommandAlias) -> Result<bool>;

    /// Write the binary plan (and its text rendering) into the execution.
    fn plan(&self, run: &PlanRun<'_>, destroy: bool) -> Result<bool>;

    /// JSON rendering of the binary plan, also written to `plan.json`.
    fn show(&self, run: &PlanRun<'_>) -> Result<Value>;

    /// Apply the binary plan.
    fn apply(&self, run: &PlanRun<'_>) -> Result<bool>;
}

// ============================================================================
// Terraform
// ============================================================================

pub struct TerraformCli {
    binary: String,
}

impl TerraformCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn chdir(run: &PlanRun<'_>) -> String {
        format!("-chdir={}", run.working_dir.display())
    }

    fn state_arg(run: &PlanRun<'_>) -> String {
        format!("-state={}", run.execution.tfstate().display())
    }

    fn exec(&self, run: &PlanRun<'_>, step: &str, args: &[String]) -> Result<bool> {
        if !runner::command_exists(&self.binary) {
            bail!("Plan tool '{}' not found (set APAF_TERRAFORM)", self.binary);
        }
        let mut full = vec![Self::chdir(run)];
        full.extend_from_slice(args);

        let log_path = run.execution.log_file(step);
        let file = File::create(&log_path)
            .with_context(|| format!("Failed to create log: {}", log_path.display()))?;
        let mut log_file = BufWriter::new(file);
        let envs = [
            ("TF_IN_AUTOMATION", "1".to_string()),
            ("TF_VAR_project_dir", run.input_dir.display().to_string()),
            (
                "TF_VAR_execution_dir",
                run.execution.dir().display().to_string(),
            ),
        ];

        log::info!("Running {} {}", self.binary, full.join(" "));
        let mut write_failed = false;
        let ok = runner::run_streaming(&self.binary, &full, &envs, |line| {
            ui::tool_line(line);
            if !write_failed && writeln!(log_file, "{}", ANSI.replace_all(line, "")).is_err() {
                write_failed = true;
            }
        })?;
        if write_failed || log_file.flush().is_err() {
            log::warn!("Log file {} is incomplete", log_path.display());
        }
        Ok(ok)
    }
}

impl PlanTool for TerraformCli {
    fn command(&self, run: &PlanRun<'_>, alias: CommandAlias) -> Result<bool> {
        let state = run.execution.tfstate();
        let args: Vec<String> = match alias {
            CommandAlias::Validate => vec!["validate".into()],
            CommandAlias::Init => vec!["init".into(), "-input=false".into()],
            CommandAlias::Providers => vec!["providers".into()],
            CommandAlias::Show if state.exists() => {
                vec!["show".into(), state.display().to_string()]
            }
            CommandAlias::Show => vec!["show".into()],
            CommandAlias::StateList => {
                vec!["state".into(), "list".into(), Self::state_arg(run)]
            }
            other => bail!("'{other}' is not a read-only plan-tool command"),
        };
        self.exec(run, alias.description().replace(' ', "_").as_str(), &args)
    }

    fn plan(&self, run: &PlanRun<'_>, destroy: bool) -> Result<bool> {
        let mut args = vec![
            "plan".to_string(),
            "-input=false".to_string(),
            Self::state_arg(run),
            format!("-out={}", run.execution.plan_binary().display()),
        ];
        if destroy {
            args.push("-destroy".to_string());
        }
        if !self.exec(run, if destroy { "plan_destroy" } else { "plan" }, &args)? {
            return Ok(false);
        }

        let show = vec![
            Self::chdir(run),
            "show".to_string(),
            "-no-color".to_string(),
            run.execution.plan_binary().display().to_string(),
        ];
        match runner::run_capture(&self.binary, &show, None) {
            Ok(text) => {
                let path = run.execution.plan_text();
                if let Err(e) = fs::write(&path, text) {
                    log::warn!("Could not write {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not render plan text: {e}"),
        }
        Ok(true)
    }

    fn show(&self, run: &PlanRun<'_>) -> Result<Value> {
        let args = vec![
            Self::chdir(run),
            "show".to_string(),
            "-json".to_string(),
            run.execution.plan_binary().display().to_string(),
        ];
        let output = runner::run_capture(&self.binary, &args, None)?;
        let path = run.execution.plan_json();
        fs::write(&path, &output).with_context(|| format!("Failed to write {}", path.display()))?;
        serde_json::from_str(&output).context("Plan tool returned invalid JSON")
    }

    fn apply(&self, run: &PlanRun<'_>) -> Result<bool> {
        let args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            Self::state_arg(run),
            run.execution.plan_binary().display().to_string(),
        ];
        self.exec(run, "apply", &args)
    }
}

// ============================================================================
// Plan summary
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub address: String,
    pub actions: Vec<String>,
}

/// Human summary of a JSON plan (`summary.yml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceChange>,
}

impl PlanSummary {
    /// Count `resource_changes[].change.actions`; no-op and read entries are skipped.
    pub fn from_plan(plan: &Value) -> Self {
        let mut summary = Self::default();
        let changes = plan
            .get("resource_changes")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        for change in changes {
            let actions: Vec<String> = change
                .pointer("/change/actions")
                .and_then(Value::as_array)
                .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            let mut counted = false;
            for action in &actions {
                match action.as_str() {
                    "create" => summary.create += 1,
                    "update" => summary.update += 1,
                    "delete" => summary.delete += 1,
                    _ => continue,
                }
                counted = true;
            }
            if counted {
                let address = change
                    .get("address")
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown>")
                    .to_string();
                summary.resources.push(ResourceChange { address, actions });
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.create == 0 && self.update == 0 && self.delete == 0
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize plan summary")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn print(&self) {
        ui::section("Plan");
        ui::kv("create", &self.create.to_string());
        ui::kv("update", &self.update.to_string());
        ui::kv("delete", &self.delete.to_string());
        for resource in &self.resources {
            ui::dim(&format!("{} ({})", resource.address, resource.actions.join(", ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_summary_counts() {
        let plan = json!({
            "resource_changes": [
                {"address": "apstra_datacenter_blueprint.dc1", "change": {"actions": ["create"]}},
                {"address": "apstra_ipv4_pool.lo", "change": {"actions": ["update"]}},
                {"address": "apstra_asn_pool.spines", "change": {"actions": ["delete", "create"]}},
                {"address": "data.apstra_blueprints.all", "change": {"actions": ["read"]}},
                {"address": "apstra_tag.x", "change": {"actions": ["no-op"]}},
            ]
        });
        let summary = PlanSummary::from_plan(&plan);
        assert_eq!((summary.create, summary.update, summary.delete), (2, 1, 1));
        assert_eq!(summary.resources.len(), 3);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_summary_empty_plan() {
        assert!(PlanSummary::from_plan(&json!({})).is_empty());
        assert!(PlanSummary::from_plan(&json!({"resource_changes": []})).is_empty());
    }

    #[test]
    fn test_summary_save() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("summary.yml");
        PlanSummary {
            create: 1,
            ..PlanSummary::default()
        }
        .save(&path)
        .unwrap();
        let loaded: PlanSummary = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.create, 1);
    }

    #[test]
    fn test_ansi_stripped() {
        assert_eq!(ANSI.replace_all("\x1b[1m\x1b[32mApply complete!\x1b[0m", ""), "Apply complete!");
    }

    #[test]
    fn test_terraform_logs_output() {
        let temp = TempDir::new().unwrap();
        let script = temp.path().join("fake-tf");
        fs::write(&script, "#!/bin/sh\necho \"\x1b[32mran $2\x1b[0m\"\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let paths = ExecutionPaths::new(temp.path().join("execution_0"));
        fs::create_dir_all(paths.logs_dir()).unwrap();

        let tool = TerraformCli::new(script.display().to_string());
        let run = PlanRun {
            working_dir: temp.path(),
            input_dir: temp.path(),
            execution: &paths,
        };
        assert!(tool.command(&run, CommandAlias::Validate).unwrap());
        let log = fs::read_to_string(paths.log_file("validate")).unwrap();
        assert_eq!(log.trim(), "ran validate");
        assert!(tool.command(&run, CommandAlias::Apply).is_err());
    }
}
