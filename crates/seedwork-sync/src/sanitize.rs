//! Per-kind sanitization of data payloads.
//!
//! Rules run before a payload is written:
//! - roles: the admin-access role (and any role matching a live admin id) is
//!   withheld, and its id is remembered as displaced.
//! - permissions: entries targeting a displaced role are dropped.
//! - dashboards, flows, operations, panels: the `user_created` reference is
//!   stripped.
//! - dashboards: nested `panels` are stripped; panels are imported later.

use std::collections::HashSet;

use indexmap::IndexSet;
use seedwork_storage::record_id;
use serde_json::{Map, Value};

use crate::template::{DataKind, Payload};

pub const ADMIN_ACCESS: &str = "admin_access";
pub const ROLE: &str = "role";
pub const USER_CREATED: &str = "user_created";
pub const PANELS: &str = "panels";

/// Role ids withheld from the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplacedRoles {
    ids: IndexSet<String>,
}

impl DisplacedRoles {
    pub fn insert(&mut self, id: impl Into<String>) {
        self.ids.insert(id.into());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// A payload after its kind's rules ran.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub payload: Payload,
    /// Records removed by a rule.
    pub dropped: usize,
}

/// Applies the sanitization rules, carrying state from roles to permissions.
#[derive(Debug, Default)]
pub struct Sanitizer {
    live_admins: HashSet<String>,
    displaced: DisplacedRoles,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of the admin roles that already exist in the backend.
    pub fn with_live_admins<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.live_admins = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn displaced(&self) -> &DisplacedRoles {
        &self.displaced
    }

    pub fn apply(&mut self, kind: DataKind, payload: Payload) -> Sanitized {
        match kind {
            DataKind::Roles => self.withhold_admin_roles(payload),
            DataKind::Permissions => self.drop_displaced_permissions(payload),
            DataKind::Dashboards => {
                let mut payload = payload;
                for_each_record(&mut payload, |record| {
                    record.remove(USER_CREATED);
                    record.remove(PANELS);
                });
                Sanitized {
                    payload,
                    dropped: 0,
                }
            }
            DataKind::Flows | DataKind::Operations | DataKind::Panels => {
                let mut payload = payload;
                for_each_record(&mut payload, |record| {
                    record.remove(USER_CREATED);
                });
                Sanitized {
                    payload,
                    dropped: 0,
                }
            }
            DataKind::Translations | DataKind::Settings => Sanitized {
                payload,
                dropped: 0,
            },
        }
    }

    fn is_admin(&self, record: &Map<String, Value>) -> bool {
        record.get(ADMIN_ACCESS) == Some(&Value::Bool(true))
            || map_id(record).is_some_and(|id| self.live_admins.contains(&id))
    }

    fn withhold_admin_roles(&mut self, payload: Payload) -> Sanitized {
        match payload {
            Payload::Singleton(record) if self.is_admin(&record) => {
                self.displace(&record);
                Sanitized {
                    payload: Payload::Batch(Vec::new()),
                    dropped: 1,
                }
            }
            Payload::Singleton(record) => Sanitized {
                payload: Payload::Singleton(record),
                dropped: 0,
            },
            Payload::Batch(records) => {
                let before = records.len();
                let mut kept = Vec::with_capacity(before);
                for record in records {
                    match record.as_object() {
                        Some(role) if self.is_admin(role) => self.displace(role),
                        _ => kept.push(record),
                    }
                }
                Sanitized {
                    dropped: before - kept.len(),
                    payload: Payload::Batch(kept),
                }
            }
        }
    }

    fn displace(&mut self, role: &Map<String, Value>) {
        if let Some(id) = map_id(role) {
            tracing::debug!(role = %id, "withholding admin role");
            self.displaced.insert(id);
        }
    }

    fn targets_displaced(&self, permission: &Map<String, Value>) -> bool {
        role_ref(permission).is_some_and(|role| self.displaced.contains(&role))
    }

    fn drop_displaced_permissions(&self, payload: Payload) -> Sanitized {
        match payload {
            Payload::Singleton(record) if self.targets_displaced(&record) => Sanitized {
                payload: Payload::Batch(Vec::new()),
                dropped: 1,
            },
            Payload::Singleton(record) => Sanitized {
                payload: Payload::Singleton(record),
                dropped: 0,
            },
            Payload::Batch(records) => {
                let before = records.len();
                let kept: Vec<Value> = records
                    .into_iter()
                    .filter(|record| {
                        !record
                            .as_object()
                            .is_some_and(|permission| self.targets_displaced(permission))
                    })
                    .collect();
                Sanitized {
                    dropped: before - kept.len(),
                    payload: Payload::Batch(kept),
                }
            }
        }
    }
}

fn map_id(record: &Map<String, Value>) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Reads the `role` reference of a permission, plain or expanded.
fn role_ref(permission: &Map<String, Value>) -> Option<String> {
    match permission.get(ROLE)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        expanded @ Value::Object(_) => record_id(expanded),
        _ => None,
    }
}

fn for_each_record(payload: &mut Payload, mut f: impl FnMut(&mut Map<String, Value>)) {
    match payload {
        Payload::Singleton(record) => f(record),
        Payload::Batch(records) => records
            .iter_mut()
            .filter_map(Value::as_object_mut)
            .for_each(f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(value: Value) -> Payload {
        Payload::classify("test", value).unwrap()
    }

    fn records(sanitized: Sanitized) -> Vec<Value> {
        match sanitized.payload {
            Payload::Batch(records) => records,
            Payload::Singleton(record) => vec![Value::Object(record)],
        }
    }

    #[test]
    fn test_admin_role_is_withheld_and_its_permissions_dropped() {
        let mut sanitizer = Sanitizer::new();

        let roles = sanitizer.apply(
            DataKind::Roles,
            batch(json!([
                { "id": "admin-1", "name": "Administrator", "admin_access": true },
                { "id": "editor", "name": "Editor", "admin_access": false }
            ])),
        );
        assert_eq!(roles.dropped, 1);
        assert_eq!(records(roles), vec![json!({ "id": "editor", "name": "Editor", "admin_access": false })]);
        assert!(sanitizer.displaced().contains("admin-1"));

        let permissions = sanitizer.apply(
            DataKind::Permissions,
            batch(json!([
                { "id": 1, "role": "admin-1", "collection": "articles" },
                { "id": 2, "role": "editor", "collection": "articles" },
                { "id": 3, "role": null, "collection": "articles" }
            ])),
        );
        assert_eq!(permissions.dropped, 1);
        let kept = records(permissions);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|p| p["role"] != json!("admin-1")));
    }

    #[test]
    fn test_live_admin_id_is_displaced_too() {
        let mut sanitizer = Sanitizer::new().with_live_admins(["live-admin"]);

        let roles = sanitizer.apply(
            DataKind::Roles,
            batch(json!([{ "id": "live-admin", "name": "Renamed", "admin_access": false }])),
        );

        assert_eq!(roles.dropped, 1);
        assert!(roles.payload.is_empty());
        assert!(sanitizer.displaced().contains("live-admin"));
    }

    #[test]
    fn test_single_admin_role_object_leaves_nothing() {
        let mut sanitizer = Sanitizer::new();
        let roles = sanitizer.apply(
            DataKind::Roles,
            batch(json!({ "id": "a", "admin_access": true })),
        );
        assert!(roles.payload.is_empty());
        assert_eq!(sanitizer.displaced().len(), 1);
    }

    #[test]
    fn test_permissions_untouched_without_displaced_roles() {
        let mut sanitizer = Sanitizer::new();
        let permissions = sanitizer.apply(
            DataKind::Permissions,
            batch(json!([{ "role": "editor" }, { "role": "viewer" }])),
        );
        assert_eq!(permissions.dropped, 0);
        assert_eq!(permissions.payload.record_count(), 2);
    }

    #[test]
    fn test_expanded_role_reference_is_matched() {
        let mut sanitizer = Sanitizer::new();
        sanitizer.apply(DataKind::Roles, batch(json!([{ "id": "adm", "admin_access": true }])));

        let permissions = sanitizer.apply(
            DataKind::Permissions,
            batch(json!([{ "role": { "id": "adm" } }])),
        );
        assert_eq!(permissions.dropped, 1);
    }

    #[test]
    fn test_dashboards_lose_owner_and_panels() {
        let mut sanitizer = Sanitizer::new();
        let dashboards = sanitizer.apply(
            DataKind::Dashboards,
            batch(json!([{
                "id": "d1",
                "name": "Sales",
                "user_created": "someone-else",
                "panels": ["p1", "p2"]
            }])),
        );
        assert_eq!(records(dashboards), vec![json!({ "id": "d1", "name": "Sales" })]);
    }

    #[test]
    fn test_owner_is_stripped_from_flows_operations_and_panels() {
        let mut sanitizer = Sanitizer::new();
        for kind in [DataKind::Flows, DataKind::Operations, DataKind::Panels] {
            let sanitized = sanitizer.apply(
                kind,
                batch(json!([{ "id": "x", "user_created": "u", "panels": 1 }])),
            );
            assert_eq!(records(sanitized), vec![json!({ "id": "x", "panels": 1 })]);
        }
    }

    #[test]
    fn test_settings_singleton_is_left_alone() {
        let mut sanitizer = Sanitizer::new();
        let payload = batch(json!({ "project_name": "Demo", "user_created": "kept" }));
        let sanitized = sanitizer.apply(DataKind::Settings, payload.clone());
        assert_eq!(sanitized.payload, payload);
        assert_eq!(sanitized.dropped, 0);
    }
}
