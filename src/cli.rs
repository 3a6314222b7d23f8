use anyhow::{Result, bail};
use clap::Parser;
use executions::{CommitAction, ExecutionId};
use std::fmt;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "apaf")]
#[command(version)]
#[command(about = "Fabric provisioning orchestrator for Terraform and Apstra", long_about = None)]
#[command(after_help = "\
Arguments are key=value pairs, for example:
  apaf customer=acme domain=dc1 project=fabric command=p
  apaf command=aa interactive=no commit=stage
  apaf history=all
  apaf rollback=choose
  apaf tool=cabling_maps pull=yes push=yes

Commands: v validate, i init, pr providers, sh show, st state list, p plan,
          a apply, aa apply without confirmation, d destroy, da destroy without confirmation")]
pub struct Cli {
    /// key=value arguments
    #[arg(value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub assignments: Vec<(String, String)>,
}

/// Parse a single `key=value` argument
pub fn parse_assignment(arg: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{arg}'"));
    }
    Ok((key.to_lowercase(), value.trim().to_string()))
}

// ============================================================================
// Command aliases
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAlias {
    Validate,
    Init,
    Providers,
    Show,
    StateList,
    Plan,
    Apply,
    ApplyAuto,
    Destroy,
    DestroyAuto,
}

impl CommandAlias {
    pub const ALL: [Self; 10] = [
        Self::Validate,
        Self::Init,
        Self::Providers,
        Self::Show,
        Self::StateList,
        Self::Plan,
        Self::Apply,
        Self::ApplyAuto,
        Self::Destroy,
        Self::DestroyAuto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "v",
            Self::Init => "i",
            Self::Providers => "pr",
            Self::Show => "sh",
            Self::StateList => "st",
            Self::Plan => "p",
            Self::Apply => "a",
            Self::ApplyAuto => "aa",
            Self::Destroy => "d",
            Self::DestroyAuto => "da",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Init => "init",
            Self::Providers => "providers",
            Self::Show => "show",
            Self::StateList => "state list",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::ApplyAuto => "apply (auto-approve)",
            Self::Destroy => "destroy",
            Self::DestroyAuto => "destroy (auto-approve)",
        }
    }

    /// Commands that never change remote state
    pub fn is_read_only(&self) -> bool {
        !matches!(
            self,
            Self::Apply | Self::ApplyAuto | Self::Destroy | Self::DestroyAuto
        )
    }

    pub fn is_destroy(&self) -> bool {
        matches!(self, Self::Destroy | Self::DestroyAuto)
    }

    /// Skip the confirmation before applying
    pub fn is_auto(&self) -> bool {
        matches!(self, Self::ApplyAuto | Self::DestroyAuto)
    }
}

impl FromStr for CommandAlias {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown command '{s}'. Valid commands: {}",
                    Self::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

impl fmt::Display for CommandAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Invocation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// The selected project
    Scope,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackRequest {
    /// Pick the target from a menu
    Choose,
    To(ExecutionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    CablingMaps,
}

/// Scope levels given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeOverrides {
    pub target: Option<String>,
    pub customer: Option<String>,
    pub domain: Option<String>,
    pub project: Option<String>,
}

impl ScopeOverrides {
    pub fn is_empty(&self) -> bool {
        self.target.is_none()
            && self.customer.is_none()
            && self.domain.is_none()
            && self.project.is_none()
    }
}

/// Validated command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Option<CommandAlias>,
    pub scope: ScopeOverrides,
    pub interactive: bool,
    pub commit: Option<CommitAction>,
    pub comment: Option<String>,
    pub history: Option<HistoryScope>,
    pub rollback: Option<RollbackRequest>,
    pub tool: Option<Tool>,
    pub pull: bool,
    pub push: bool,
    pub log: Option<log::LevelFilter>,
}

impl Default for Invocation {
    fn default() -> Self {
        Self {
            command: None,
            scope: ScopeOverrides::default(),
            interactive: true,
            commit: None,
            comment: None,
            history: None,
            rollback: None,
            tool: None,
            pull: false,
            push: false,
            log: None,
        }
    }
}

impl Invocation {
    pub fn from_assignments(assignments: &[(String, String)]) -> Result<Self> {
        let mut inv = Self::default();
        for (key, value) in assignments {
            match key.as_str() {
                "command" => inv.command = Some(value.parse()?),
                "target" => inv.scope.target = Some(value.clone()),
                "customer" => inv.scope.customer = Some(value.clone()),
                "domain" => inv.scope.domain = Some(value.clone()),
                "project" => inv.scope.project = Some(value.clone()),
                "interactive" => inv.interactive = parse_yes_no(key, value)?,
                "commit" => {
                    inv.commit = Some(match value.as_str() {
                        "commit" => CommitAction::Commit,
                        "stage" => CommitAction::Stage,
                        _ => bail!("Invalid commit '{value}' (expected commit or stage)"),
                    });
                }
                "comment" => inv.comment = Some(value.clone()),
                "history" => {
                    inv.history = Some(match value.as_str() {
                        "scope" | "yes" => HistoryScope::Scope,
                        "all" => HistoryScope::All,
                        _ => bail!("Invalid history '{value}' (expected scope or all)"),
                    });
                }
                "rollback" => {
                    if value.is_empty() {
                        bail!("rollback needs an execution id or 'choose'");
                    }
                    inv.rollback = Some(if value == "choose" {
                        RollbackRequest::Choose
                    } else {
                        RollbackRequest::To(ExecutionId::new(value.clone()))
                    });
                }
                "tool" => {
                    inv.tool = Some(match value.as_str() {
                        "cabling_maps" => Tool::CablingMaps,
                        _ => bail!("Unknown tool '{value}' (available: cabling_maps)"),
                    });
                }
                "pull" => inv.pull = parse_yes_no(key, value)?,
                "push" => inv.push = parse_yes_no(key, value)?,
                "log" => {
                    inv.log = Some(
                        value
                            .parse()
                            .map_err(|_| anyhow::anyhow!("Invalid log level '{value}'"))?,
                    );
                }
                _ => bail!("Unknown argument '{key}'"),
            }
        }

        let actions = [
            inv.command.is_some(),
            inv.history.is_some(),
            inv.rollback.is_some(),
            inv.tool.is_some(),
        ];
        if actions.into_iter().filter(|set| *set).count() > 1 {
            bail!("Only one of command, history, rollback or tool may be given");
        }
        if (inv.pull || inv.push) && inv.tool.is_none() {
            bail!("pull and push require tool=cabling_maps");
        }
        Ok(inv)
    }

    /// Nothing to run: show the interactive menu
    pub fn wants_menu(&self) -> bool {
        self.command.is_none()
            && self.history.is_none()
            && self.rollback.is_none()
            && self.tool.is_none()
    }
}

fn parse_yes_no(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" => Ok(true),
        "no" | "n" | "false" => Ok(false),
        _ => bail!("Invalid {key} '{value}' (expected yes or no)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        let assignments = args
            .iter()
            .map(|a| parse_assignment(a).map_err(anyhow::Error::msg))
            .collect::<Result<Vec<_>>>()?;
        Invocation::from_assignments(&assignments)
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("Comment=nightly run").unwrap(),
            ("comment".to_string(), "nightly run".to_string())
        );
        assert_eq!(
            parse_assignment("comment=a=b").unwrap(),
            ("comment".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("command").is_err());
        assert!(parse_assignment("=x").is_err());
    }

    #[test]
    fn test_full_invocation() {
        let inv = parse(&[
            "command=aa",
            "customer=acme",
            "interactive=no",
            "commit=stage",
            "log=debug",
        ])
        .unwrap();
        assert_eq!(inv.command, Some(CommandAlias::ApplyAuto));
        assert_eq!(inv.scope.customer.as_deref(), Some("acme"));
        assert!(!inv.interactive);
        assert_eq!(inv.commit, Some(CommitAction::Stage));
        assert_eq!(inv.log, Some(log::LevelFilter::Debug));
        assert!(!inv.wants_menu());
    }

    #[test]
    fn test_rejects_unknown_and_malformed() {
        assert!(parse(&["colour=blue"]).is_err());
        assert!(parse(&["command=apply"]).is_err());
        assert!(parse(&["interactive=maybe"]).is_err());
        assert!(parse(&["commit=push"]).is_err());
        assert!(parse(&["tool=rack_delete"]).is_err());
        assert!(parse(&["pull=yes"]).is_err());
        assert!(parse(&["command=p", "history=all"]).is_err());
    }

    #[test]
    fn test_rollback_values() {
        assert_eq!(parse(&["rollback=choose"]).unwrap().rollback, Some(RollbackRequest::Choose));
        assert_eq!(
            parse(&["rollback=20250101120000000000"]).unwrap().rollback,
            Some(RollbackRequest::To(ExecutionId::new("20250101120000000000")))
        );
    }

    #[test]
    fn test_empty_wants_menu() {
        let inv = parse(&["customer=acme"]).unwrap();
        assert!(inv.wants_menu());
        assert!(inv.interactive);
    }

    #[test]
    fn test_alias_classes() {
        for alias in ["v", "i", "pr", "sh", "st", "p"] {
            assert!(alias.parse::<CommandAlias>().unwrap().is_read_only());
        }
        assert!(CommandAlias::DestroyAuto.is_destroy());
        assert!(CommandAlias::DestroyAuto.is_auto());
        assert!(!CommandAlias::Apply.is_auto());
        assert!(!CommandAlias::Apply.is_read_only());
    }
}
