use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::store::Membership;
use crate::types::{Id, Permission, Role};

/// Workspace permission checks for one caller within one call. Each
/// distinct workspace is looked up once.
pub struct Access<'a> {
    membership: &'a dyn Membership,
    user_id: Id,
    roles: HashMap<Id, Option<Role>>,
}

impl<'a> Access<'a> {
    pub fn new(membership: &'a dyn Membership, user_id: Id) -> Self {
        Self {
            membership,
            user_id,
            roles: HashMap::new(),
        }
    }

    fn role(&mut self, workspace_id: Id) -> Result<Option<Role>> {
        if let Some(role) = self.roles.get(&workspace_id) {
            return Ok(*role);
        }
        let role = match self
            .membership
            .get_workspace_user_role(workspace_id, self.user_id)
        {
            Ok(role) => Some(role),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        self.roles.insert(workspace_id, role);
        Ok(role)
    }

    /// Returns true if the caller's role in the workspace grants `required`.
    pub fn check(&mut self, workspace_id: Id, required: Permission) -> Result<bool> {
        Ok(self
            .role(workspace_id)?
            .is_some_and(|role| role.permissions().has(required)))
    }

    /// Check the permission, returning `PermissionDenied` if it is missing.
    pub fn require(&mut self, workspace_id: Id, required: Permission) -> Result<()> {
        if !self.check(workspace_id, required)? {
            return Err(Error::PermissionDenied);
        }
        Ok(())
    }
}
