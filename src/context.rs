//! Everything a run needs, passed explicitly by reference.

use crate::paths::Layout;
use crate::plan::PlanTool;
use crate::prompt::{AutoAnswer, Prompter};
use crate::scope::ResolvedScope;
use crate::settings::Settings;
use anyhow::{Context as _, Result};
use apstra::{Client, UreqTransport};
use executions::{ExecutionTree, ScopeFilter};
use std::path::PathBuf;
use std::time::Duration;

pub struct Context {
    pub layout: Layout,
    pub settings: Settings,
    pub scope: ResolvedScope,
    pub prompter: Box<dyn Prompter>,
    pub plan_tool: Box<dyn PlanTool>,
    client: Option<Client>,
}

impl Context {
    pub fn new(
        layout: Layout,
        settings: Settings,
        scope: ResolvedScope,
        prompter: Box<dyn Prompter>,
        plan_tool: Box<dyn PlanTool>,
    ) -> Self {
        Self {
            layout,
            settings,
            scope,
            prompter,
            plan_tool,
            client: None,
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Controller client for the selected target
    pub fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .with_context(|| format!("Not connected to target '{}'", self.scope.target))
    }

    /// The prompter for a run; unattended runs answer every prompt with its default
    pub fn prompter(&self, interactive: bool) -> &dyn Prompter {
        if interactive {
            self.prompter.as_ref()
        } else {
            &AutoAnswer
        }
    }

    pub fn input_dir(&self) -> PathBuf {
        self.layout.project_input(&self.scope)
    }

    pub fn blueprints_dir(&self) -> PathBuf {
        self.layout.blueprints_dir(&self.scope)
    }

    pub fn working_dir(&self) -> PathBuf {
        self.settings.terraform_dir(self.layout.home())
    }

    pub fn tree(&self) -> ExecutionTree {
        ExecutionTree::new(
            self.layout.execution_root(&self.scope),
            self.settings.executions.retention,
        )
    }

    pub fn history_filter(&self) -> ScopeFilter {
        ScopeFilter::project(&self.scope.customer, &self.scope.domain, &self.scope.project)
    }
}

/// Log in lazily to the configured target
pub fn connect(settings: &Settings, target: &str) -> Result<Client> {
    let target_settings = settings.target(target)?;
    let credentials = target_settings.credentials()?;
    let transport = UreqTransport::new(
        &target_settings.url,
        target_settings.insecure,
        Duration::from_secs(target_settings.timeout_secs),
    );
    log::debug!("Controller for {target}: {}", target_settings.url);
    Ok(Client::new(Box::new(transport), credentials)
        .with_policy(settings.polling.policy())
        .with_max_permanent_revisions(settings.commit.max_permanent_revisions))
}
