//! Blueprint operations: listing, deploy, revert, delete, commit-check and
//! Time Voyager revisions.

use crate::client::Client;
use crate::error::{Error, Result};
use crate::poll::{Completion, PollOutcome};
use crate::transport::{Method, Request};
use crate::types::{BlueprintSummary, BuildErrors, CommitCheckReport, DiffStatus, Revision};
use serde_json::{Value, json};

fn path(id: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        format!("/api/blueprints/{id}")
    } else {
        format!("/api/blueprints/{id}/{suffix}")
    }
}

impl Client {
    /// List all blueprints.
    pub fn blueprints(&self) -> Result<Vec<BlueprintSummary>> {
        self.get_items("list blueprints", "/api/blueprints")?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(Error::from))
            .collect()
    }

    /// Find a blueprint by label.
    pub fn find_blueprint(&self, label: &str) -> Result<Option<BlueprintSummary>> {
        Ok(self.blueprints()?.into_iter().find(|bp| bp.label == label))
    }

    /// Resolve a blueprint label to its id.
    pub fn blueprint_id(&self, label: &str) -> Result<String> {
        self.find_blueprint(label)?
            .map(|bp| bp.id)
            .ok_or_else(|| Error::NotFound {
                kind: "blueprint".to_string(),
                name: label.to_string(),
            })
    }

    /// Current staging version of a blueprint.
    pub fn blueprint_version(&self, id: &str) -> Result<u64> {
        let body = self.expect_success("get blueprint", &Request::new(Method::Get, path(id, "")))?;
        body.get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidResponse(format!("blueprint {id} without version")))
    }

    /// Staging vs deployed status.
    pub fn diff_status(&self, id: &str) -> Result<DiffStatus> {
        self.get_as("diff status", &path(id, "diff-status"))
    }

    /// Build errors of the staging blueprint.
    pub fn build_errors(&self, id: &str) -> Result<BuildErrors> {
        let body = self.expect_success("build errors", &Request::new(Method::Get, path(id, "errors")))?;
        Ok(BuildErrors::from_document(body))
    }

    /// Commit the staging blueprint.
    pub fn deploy(&self, id: &str, description: &str) -> Result<PollOutcome> {
        let version = self.blueprint_version(id)?;
        let initial = Request::new(Method::Put, path(id, "deploy")).json(json!({
            "version": version,
            "description": description,
        }));
        let poll = Request::new(Method::Get, path(id, "deploy"));
        self.run_async("deploy", Completion::Accepted, &initial, &poll)
    }

    /// Discard uncommitted staging changes.
    pub fn revert(&self, id: &str) -> Result<PollOutcome> {
        let initial = Request::new(Method::Post, path(id, "revert")).json(json!({}));
        let poll = Request::new(Method::Get, path(id, "revert"));
        self.run_async("revert", Completion::Accepted, &initial, &poll)
    }

    /// Delete a blueprint and wait until it is gone.
    pub fn delete_blueprint(&self, id: &str) -> Result<PollOutcome> {
        let initial = Request::new(Method::Delete, path(id, ""));
        let poll = Request::new(Method::Get, path(id, ""));
        self.run_async("delete blueprint", Completion::Gone, &initial, &poll)
    }

    /// Run a commit-check and fetch its per-system result.
    pub fn commit_check(&self, id: &str) -> Result<CommitCheckReport> {
        let initial = Request::new(Method::Post, path(id, "commit-check")).json(json!({}));
        let poll = Request::new(Method::Get, path(id, "commit-check-result"));
        self.run_async("commit-check", Completion::Accepted, &initial, &poll)?;
        self.get_as("commit-check result", &path(id, "commit-check-result"))
    }

    /// Time Voyager revisions, oldest first.
    pub fn revisions(&self, id: &str) -> Result<Vec<Revision>> {
        let mut revisions = self
            .get_items("list revisions", &path(id, "revisions"))?
            .into_iter()
            .map(|item| serde_json::from_value::<Revision>(item).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;
        revisions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(revisions)
    }

    /// Delete a revision.
    pub fn delete_revision(&self, id: &str, revision_id: &str) -> Result<()> {
        let request = Request::new(Method::Delete, path(id, &format!("revisions/{revision_id}")));
        self.expect_success("delete revision", &request)?;
        Ok(())
    }

    /// Mark a revision as permanent, evicting the oldest permanent revisions
    /// first so the blueprint never exceeds the quota.
    ///
    /// Returns the ids of the evicted revisions.
    pub fn keep_revision(&self, id: &str, revision_id: &str) -> Result<Vec<String>> {
        let mut saved: Vec<Revision> = self
            .revisions(id)?
            .into_iter()
            .filter(|r| r.user_saved && r.revision_id != revision_id)
            .collect();

        let mut evicted = Vec::new();
        while saved.len() >= self.max_permanent_revisions {
            let oldest = saved.remove(0);
            log::info!("Evicting permanent revision {} of blueprint {id}", oldest.revision_id);
            self.delete_revision(id, &oldest.revision_id)?;
            evicted.push(oldest.revision_id);
        }

        let request = Request::new(Method::Put, path(id, &format!("revisions/{revision_id}/keep")))
            .json(json!({"user_saved": true}));
        self.expect_success("keep revision", &request)?;
        Ok(evicted)
    }

    /// Deploy, then keep the newest revision permanently.
    ///
    /// Returns the evicted revision ids.
    pub fn deploy_and_keep(&self, id: &str, description: &str) -> Result<Vec<String>> {
        self.deploy(id, description)?;
        match self.revisions(id)?.last() {
            Some(latest) => self.keep_revision(id, &latest.revision_id),
            None => {
                log::warn!("Blueprint {id} has no revision to keep after deploy");
                Ok(Vec::new())
            }
        }
    }

    /// Whether the blueprint has any Time Voyager revision to revert to.
    pub fn has_history(&self, id: &str) -> Result<bool> {
        Ok(!self.revisions(id)?.is_empty())
    }
}
