mod blueprints;
mod cli;
mod commands;
mod context;
mod orchestrator;
mod paths;
mod plan;
mod prompt;
mod runner;
mod scope;
mod settings;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, HistoryScope, Invocation, Tool};
use context::Context;
use executions::ScopeFilter;
use orchestrator::{RunRequest, exit};
use paths::Layout;
use plan::TerraformCli;
use prompt::Interactive;
use scope::ScopeFile;
use settings::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut invocation = Invocation::from_assignments(&cli.assignments)?;

    // log= wins over RUST_LOG
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = invocation.log {
        logger.filter_level(level);
    }
    logger.format_timestamp(None).init();

    let layout = Layout::new(paths::home_dir()?);
    let mut settings = Settings::load(&layout.settings_file())?;
    settings.apply_env(|key| std::env::var(key).ok());

    let mut scope_file = ScopeFile::load(&layout.scope_file())?;
    commands::menu::apply_overrides(&mut scope_file, &invocation.scope)?;

    if invocation.history == Some(HistoryScope::All) {
        return commands::history::run(&layout.executions_dir(), &ScopeFilter::All);
    }
    if invocation.wants_menu() {
        let command = commands::menu::run(&Interactive, &mut scope_file, &settings, &layout)?;
        invocation.command = Some(command);
    }

    let scope = scope_file.resolve()?;
    if invocation.history == Some(HistoryScope::Scope) {
        let filter = ScopeFilter::project(&scope.customer, &scope.domain, &scope.project);
        return commands::history::run(&layout.executions_dir(), &filter);
    }

    let client = context::connect(&settings, &scope.target)?;
    let plan_tool = TerraformCli::new(settings.terraform.binary.clone());
    let ctx = Context::new(
        layout,
        settings,
        scope,
        Box::new(Interactive),
        Box::new(plan_tool),
    )
    .with_client(client);

    if invocation.tool == Some(Tool::CablingMaps) {
        commands::cabling::run(&ctx, invocation.pull, invocation.push)?;
        return Ok(());
    }

    let codes = if let Some(rollback) = &invocation.rollback {
        commands::rollback::run(
            &ctx,
            rollback,
            invocation.interactive,
            invocation.comment.clone(),
        )?
    } else {
        let Some(command) = invocation.command else {
            anyhow::bail!("Nothing to run");
        };
        let request = RunRequest {
            commit: invocation.commit,
            comment: invocation.comment.clone(),
            ..RunRequest::new(command, invocation.interactive)
        };
        orchestrator::run(&ctx, request)?
    };

    let status = exit::process_status(&codes, ctx.settings.strict_exit_status);
    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
