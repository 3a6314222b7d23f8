//! Execution history report.

use crate::ui;
use anyhow::Result;
use colored::Colorize;
use executions::{ExecutionId, ExecutionRecord, ScopeFilter, StoredExecution};
use std::path::Path;

const COMMENT_WIDTH: usize = 40;

pub fn run(executions_dir: &Path, filter: &ScopeFilter) -> Result<()> {
    let executions = executions::history(executions_dir, filter)?;
    let all = *filter == ScopeFilter::All;

    ui::header(&match filter {
        ScopeFilter::All => "Execution history (all projects)".to_string(),
        ScopeFilter::Project {
            customer,
            domain,
            project,
        } => format!("Execution history of {customer}/{domain}/{project}"),
    });

    if executions.is_empty() {
        ui::dim("No executions recorded");
        return Ok(());
    }

    for execution in &executions {
        let line = row(&execution.record, all);
        match execution.record.exit_code {
            Some(code) if code.is_successful() => println!("{} {line}", "✓".green()),
            Some(code) if code.is_failure() || code.is_blocked() => {
                println!("{} {line}", "✗".red());
            }
            _ => println!("{} {line}", "·".dimmed()),
        }
    }

    println!();
    let candidates = count_candidates(&executions);
    ui::kv("Executions", &executions.len().to_string());
    ui::kv("Rollback candidates", &candidates.to_string());
    Ok(())
}

fn row(record: &ExecutionRecord, with_scope: bool) -> String {
    let mut line = format!(
        "{:<20} {:<19} {:<3} {:<28}",
        record.execution_id.as_ref().map_or("?", ExecutionId::as_str),
        record.created_local.as_deref().unwrap_or(""),
        record.command,
        record.exit_code.map(|c| c.to_string()).unwrap_or_default(),
    );
    if with_scope {
        line.push_str(&format!(" {}", record.scope_label()));
    }

    let changed: Vec<&str> = record
        .changes
        .iter()
        .filter(|(_, changed)| **changed)
        .map(|(menu, _)| menu.as_str())
        .collect();
    if !changed.is_empty() {
        line.push_str(&format!(" menus:{}", changed.join(",")));
    }
    if !record.blueprints_with_changes.is_empty() {
        line.push_str(&format!(" bp:{}", record.blueprints_with_changes.join(",")));
    }
    if let Some(action) = record.commit_action {
        line.push_str(&format!(" [{action}]"));
    }
    if record.post_rollback {
        line.push_str(" (corrective)");
    }
    if let Some(target) = &record.rollback_target {
        line.push_str(&format!(" -> {target}"));
    }
    if let Some(comment) = record.commit_comment.as_deref().filter(|c| !c.is_empty()) {
        line.push_str(&format!(" \"{}\"", ui::truncate(comment, COMMENT_WIDTH)));
    }
    line
}

fn count_candidates(executions: &[StoredExecution]) -> usize {
    executions
        .iter()
        .filter(|e| e.record.exit_code.is_some_and(|c| c.is_successful()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use executions::{CommitAction, ExitCode, MetadataStore};
    use std::fs;
    use tempfile::TempDir;

    fn record(id: &str, code: ExitCode) -> ExecutionRecord {
        ExecutionRecord {
            execution_id: Some(ExecutionId::new(id)),
            created_local: Some("2025-03-01 10:00:00".to_string()),
            exit_code: Some(code),
            customer: "acme".to_string(),
            domain: "dc1".to_string(),
            project: "fabric".to_string(),
            command: "aa".to_string(),
            ..ExecutionRecord::default()
        }
    }

    #[test]
    fn test_row_lists_changes_and_comment() {
        let mut rec = record("20250301100000000001", ExitCode::TfExecOk);
        rec.changes.insert("design".to_string(), true);
        rec.changes.insert("resources".to_string(), false);
        rec.blueprints_with_changes = vec!["dc1".to_string()];
        rec.commit_action = Some(CommitAction::Commit);
        rec.commit_comment = Some("x".repeat(60));

        let line = row(&rec, false);
        assert!(line.starts_with("20250301100000000001 2025-03-01 10:00:00 aa"));
        assert!(line.contains("TF_EXEC_OK"));
        assert!(line.contains("menus:design "));
        assert!(!line.contains("resources"));
        assert!(line.contains("bp:dc1"));
        assert!(line.contains(&format!("\"{}...\"", "x".repeat(37))));
        assert!(!line.contains("acme/dc1/fabric"));
    }

    #[test]
    fn test_row_with_scope_and_rollback() {
        let mut rec = record("20250301100000000002", ExitCode::UserRollback);
        rec.post_rollback = true;
        rec.rollback_target = Some(ExecutionId::new("20250301090000000000"));

        let line = row(&rec, true);
        assert!(line.contains("acme/dc1/fabric"));
        assert!(line.contains("(corrective)"));
        assert!(line.contains("-> 20250301090000000000"));
    }

    #[test]
    fn test_run_reads_project_history() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        for (i, code) in [ExitCode::TfExecOk, ExitCode::TfExecWErrorsRevert]
            .into_iter()
            .enumerate()
        {
            let dir = base.join(format!("acme/dc1/fabric/execution_{i}"));
            fs::create_dir_all(&dir).unwrap();
            MetadataStore::new(&dir)
                .create(&record(&format!("2025030110000000000{i}"), code))
                .unwrap();
        }

        let executions =
            executions::history(base, &ScopeFilter::project("acme", "dc1", "fabric")).unwrap();
        assert_eq!(count_candidates(&executions), 1);
        run(base, &ScopeFilter::project("acme", "dc1", "fabric")).unwrap();
        run(base, &ScopeFilter::All).unwrap();
        run(&base.join("missing"), &ScopeFilter::All).unwrap();
    }
}
