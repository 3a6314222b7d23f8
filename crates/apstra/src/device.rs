//! Systems and cabling maps.

use crate::client::Client;
use crate::error::Result;
use crate::transport::{Method, Request};
use crate::types::System;
use serde_json::Value;

fn system(item: &Value) -> Option<System> {
    let id = item.get("id")?.as_str()?.to_string();
    let device_key = item
        .get("device_key")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let hostname = item
        .pointer("/facts/hostname")
        .or_else(|| item.get("hostname"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(System {
        id,
        device_key,
        hostname,
    })
}

impl Client {
    /// Managed systems known to the controller.
    pub fn systems(&self) -> Result<Vec<System>> {
        let items = self.get_items("list systems", "/api/systems")?;
        Ok(items.iter().filter_map(system).collect())
    }

    /// Cabling map of a blueprint.
    pub fn cabling_map(&self, blueprint_id: &str) -> Result<Value> {
        let path = format!("/api/blueprints/{blueprint_id}/experience/web/cabling-map");
        self.expect_success("get cabling map", &Request::new(Method::Get, path))
    }

    /// Replace the cabling map of a blueprint.
    pub fn update_cabling_map(&self, blueprint_id: &str, map: Value) -> Result<()> {
        let path = format!("/api/blueprints/{blueprint_id}/experience/web/cabling-map");
        self.expect_success("update cabling map", &Request::new(Method::Patch, path).json(map))?;
        Ok(())
    }
}
