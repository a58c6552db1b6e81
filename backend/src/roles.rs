//! Role directory
//!
//! Steps are assigned to roles, never to people. The directory answers who
//! currently holds a role so callers can route work; it never authorizes.

use std::collections::HashMap;

use crate::config::RoleRoster;

/// Resolves a role name to the staff identifiers holding it
pub trait RoleDirectory: Send + Sync {
    fn resolve_role(&self, role: &str) -> Vec<String>;
}

/// Directory backed by the configured roster
#[derive(Debug, Clone, Default)]
pub struct StaticRoleDirectory {
    members: HashMap<String, Vec<String>>,
}

impl StaticRoleDirectory {
    pub fn new(roster: &RoleRoster) -> Self {
        let members = roster
            .members
            .iter()
            .map(|(role, staff)| (role.to_ascii_lowercase(), staff.clone()))
            .collect();
        Self { members }
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn resolve_role(&self, role: &str) -> Vec<String> {
        self.members
            .get(&role.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }
}
