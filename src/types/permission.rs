use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission represents a bitmask of workspace permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const READ: Permission = Permission(1 << 0); // 1
    pub const WRITE: Permission = Permission(1 << 1); // 2
    pub const DELETE: Permission = Permission(1 << 2); // 4

    /// Returns true if this permission bitmask contains the required permission.
    #[must_use]
    pub const fn has(self, required: Permission) -> bool {
        self.0 & required.0 == required.0
    }

    /// Combines two permission bitmasks.
    #[must_use]
    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// Returns a slice of permission strings for this bitmask.
    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut perms = Vec::new();
        if self.has(Self::READ) {
            perms.push("read");
        }
        if self.has(Self::WRITE) {
            perms.push("write");
        }
        if self.has(Self::DELETE) {
            perms.push("delete");
        }
        perms
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}
