use serde::{Deserialize, Serialize};

use super::Id;
use crate::error::{Error, Result};

/// A response assertion expression attached to a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpAssert {
    pub id: Id,
    pub http_id: Id,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HttpAssert {
    pub fn validate(&self) -> Result<()> {
        let has_overrides = self.delta_value.is_some()
            || self.delta_enabled.is_some()
            || self.delta_description.is_some()
            || self.delta_display_order.is_some();
        if !self.is_delta && (self.parent_id.is_some() || has_overrides) {
            return Err(Error::Constraint(
                "override fields are only allowed on delta rows".into(),
            ));
        }
        Ok(())
    }
}
