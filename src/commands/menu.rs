//! Interactive scope and command selection.

use crate::cli::{CommandAlias, ScopeOverrides};
use crate::paths::Layout;
use crate::prompt::Prompter;
use crate::scope::{Level, ScopeFile};
use crate::settings::Settings;
use crate::ui;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const NEW_ENTRY: &str = "(new)";

/// Persist scope levels given on the command line, top level first
pub fn apply_overrides(scope_file: &mut ScopeFile, overrides: &ScopeOverrides) -> Result<()> {
    let levels = [
        (Level::Target, &overrides.target),
        (Level::Customer, &overrides.customer),
        (Level::Domain, &overrides.domain),
        (Level::Project, &overrides.project),
    ];
    for (level, value) in levels {
        if let Some(value) = value {
            scope_file.set(level, value)?;
        }
    }
    Ok(())
}

/// Walk the scope levels, then pick a command
pub fn run(
    prompter: &dyn Prompter,
    scope_file: &mut ScopeFile,
    settings: &Settings,
    layout: &Layout,
) -> Result<CommandAlias> {
    ui::banner();

    let targets: Vec<String> = settings.targets.keys().cloned().collect();
    choose(prompter, scope_file, Level::Target, targets)?;

    let mut dir = layout.projects_dir();
    for level in [Level::Customer, Level::Domain, Level::Project] {
        choose(prompter, scope_file, level, subdirs(&dir)?)?;
        if let Some(value) = scope_file.scope().get(level) {
            dir = dir.join(value);
        }
    }

    let items: Vec<String> = CommandAlias::ALL
        .iter()
        .map(|c| format!("{:<3} {}", c.as_str(), c.description()))
        .collect();
    let index = prompter.select("Command", &items, 0)?;
    CommandAlias::ALL
        .get(index)
        .copied()
        .context("No command selected")
}

fn choose(
    prompter: &dyn Prompter,
    scope_file: &mut ScopeFile,
    level: Level,
    options: Vec<String>,
) -> Result<()> {
    let label = format!("{level:?}");
    let default = scope_file
        .scope()
        .get(level)
        .and_then(|current| options.iter().position(|o| o == current))
        .unwrap_or(0);

    let mut items = options;
    items.push(NEW_ENTRY.to_string());
    let index = prompter.select(&label, &items, default)?;

    let value = if index + 1 < items.len() {
        items.swap_remove(index)
    } else {
        prompter.input(&format!("New {}", label.to_lowercase()), None)?
    };
    scope_file.set(level, value.trim())
}

/// Directory names below `dir`, sorted. A missing directory has none.
fn subdirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::testing::{Answer, Scripted};
    use crate::settings::TargetSettings;
    use tempfile::TempDir;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        for name in ["lab", "prod"] {
            settings.targets.insert(
                name.to_string(),
                TargetSettings {
                    url: format!("https://{name}.example"),
                    username: None,
                    password: None,
                    insecure: true,
                    timeout_secs: 30,
                },
            );
        }
        settings
    }

    #[test]
    fn test_overrides_apply_top_down() {
        let temp = TempDir::new().unwrap();
        let mut file = ScopeFile::load(&temp.path().join("scope.yml")).unwrap();
        let overrides = ScopeOverrides {
            target: Some("lab".to_string()),
            customer: Some("acme".to_string()),
            domain: None,
            project: Some("fabric".to_string()),
        };
        apply_overrides(&mut file, &overrides).unwrap();

        let scope = file.scope();
        assert_eq!(scope.target.as_deref(), Some("lab"));
        assert_eq!(scope.customer.as_deref(), Some("acme"));
        assert_eq!(scope.project.as_deref(), Some("fabric"));
    }

    #[test]
    fn test_menu_walks_levels_and_picks_command() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir_all(layout.projects_dir().join("acme/dc1/fabric")).unwrap();
        fs::create_dir_all(layout.projects_dir().join("acme/dc2")).unwrap();
        let mut file = ScopeFile::load(&layout.scope_file()).unwrap();

        let prompter = Scripted::new(vec![
            Answer::Select(1),
            Answer::Select(0),
            Answer::Select(0),
            Answer::Select(0),
            Answer::Select(5),
        ]);
        let command = run(&prompter, &mut file, &settings(), &layout).unwrap();

        assert_eq!(command, CommandAlias::Plan);
        let resolved = file.resolve().unwrap();
        assert_eq!(resolved.to_string(), "prod:acme/dc1/fabric");
        assert_eq!(
            *prompter.asked.borrow(),
            vec!["Target", "Customer", "Domain", "Project", "Command"]
        );
    }

    #[test]
    fn test_menu_new_entry_prompts_for_name() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let mut file = ScopeFile::load(&layout.scope_file()).unwrap();

        let prompter = Scripted::new(vec![
            Answer::Select(0),
            Answer::Select(0),
            Answer::Input("acme".to_string()),
            Answer::Select(0),
            Answer::Input("dc1".to_string()),
            Answer::Select(0),
            Answer::Input(" fabric ".to_string()),
            Answer::Select(6),
        ]);
        let command = run(&prompter, &mut file, &settings(), &layout).unwrap();

        assert_eq!(command, CommandAlias::Apply);
        assert_eq!(file.resolve().unwrap().label(), "acme_dc1_fabric");
    }

    #[test]
    fn test_menu_defaults_to_current_scope() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir_all(layout.projects_dir().join("acme/dc1/fabric")).unwrap();
        fs::create_dir_all(layout.projects_dir().join("zeta/dc9/core")).unwrap();
        let mut file = ScopeFile::load(&layout.scope_file()).unwrap();
        apply_overrides(
            &mut file,
            &ScopeOverrides {
                target: Some("lab".to_string()),
                customer: Some("zeta".to_string()),
                domain: Some("dc9".to_string()),
                project: Some("core".to_string()),
            },
        )
        .unwrap();

        // An exhausted script answers with each default
        let prompter = Scripted::new(Vec::new());
        run(&prompter, &mut file, &settings(), &layout).unwrap();

        assert_eq!(file.resolve().unwrap().to_string(), "lab:zeta/dc9/core");
    }
}
