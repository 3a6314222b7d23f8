//! Design and resource objects (templates, logical devices, pools, ...).

use crate::client::Client;
use crate::error::{Error, Result};
use crate::transport::{Method, Request};
use crate::types::{ObjectKind, RemoteObject};
use serde_json::Value;

fn remote_object(item: &Value) -> Option<RemoteObject> {
    let id = item.get("id")?.as_str()?;
    let name = item
        .get("display_name")
        .or_else(|| item.get("label"))
        .and_then(Value::as_str)?;
    Some(RemoteObject {
        id: id.to_string(),
        name: name.to_string(),
    })
}

impl Client {
    /// List objects of one kind.
    pub fn objects(&self, kind: ObjectKind) -> Result<Vec<RemoteObject>> {
        let items = self.get_items(&format!("list {kind}"), kind.endpoint())?;
        Ok(items.iter().filter_map(remote_object).collect())
    }

    /// Resolve an object name to its id.
    pub fn object_id(&self, kind: ObjectKind, name: &str) -> Result<String> {
        self.objects(kind)?
            .into_iter()
            .find(|o| o.name == name)
            .map(|o| o.id)
            .ok_or_else(|| Error::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }

    /// Delete an object by id.
    pub fn delete_object(&self, kind: ObjectKind, id: &str) -> Result<()> {
        let request = Request::new(Method::Delete, format!("{}/{id}", kind.endpoint()));
        self.expect_success(&format!("delete {kind}"), &request)?;
        Ok(())
    }

    /// Delete an object by name. Returns `false` when it did not exist.
    pub fn delete_object_by_name(&self, kind: ObjectKind, name: &str) -> Result<bool> {
        match self.object_id(kind, name) {
            Ok(id) => {
                self.delete_object(kind, &id)?;
                log::info!("Deleted {kind} '{name}'");
                Ok(true)
            }
            Err(e) if e.is_ignorable() => {
                log::debug!("{kind} '{name}' already absent");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::client;
    use crate::transport::MockTransport;
    use serde_json::json;

    #[test]
    fn test_objects_use_display_name_or_label() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(
            Method::Get,
            "/api/design/configlets",
            200,
            json!({"items": [
                {"id": "c1", "display_name": "ntp"},
                {"id": "c2", "label": "syslog"},
                {"id": "c3"},
            ]}),
        );

        let names: Vec<_> = client
            .objects(ObjectKind::Configlet)
            .unwrap()
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(names, vec!["ntp", "syslog"]);
    }

    #[test]
    fn test_delete_by_name() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(
            Method::Get,
            "/api/resources/asn-pools",
            200,
            json!({"items": [{"id": "p1", "display_name": "spines"}]}),
        )
        .respond(Method::Delete, "/api/resources/asn-pools/p1", 204, Value::Null);

        assert!(client.delete_object_by_name(ObjectKind::AsnPool, "spines").unwrap());
        assert!(!client.delete_object_by_name(ObjectKind::AsnPool, "leafs").unwrap());
        assert_eq!(mock.count(Method::Delete, "/api/resources/asn-pools/p1"), 1);
    }

    #[test]
    fn test_delete_failure_propagates() {
        let mock = MockTransport::new();
        let client = client(&mock);
        mock.respond(
            Method::Get,
            "/api/design/logical-devices",
            200,
            json!({"items": [{"id": "ld", "display_name": "AOS-48x10"}]}),
        )
        .respond(Method::Delete, "/api/design/logical-devices/ld", 422, json!({"errors": "in use"}));

        let err = client
            .delete_object_by_name(ObjectKind::LogicalDevice, "AOS-48x10")
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
    }
}
