use std::fmt;

use serde::{Deserialize, Serialize};

use super::Id;
use crate::error::{Error, Result};

/// The four child collections that share the key/value row shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyValueKind {
    Header,
    SearchParam,
    BodyForm,
    BodyUrlEncoded,
}

impl KeyValueKind {
    pub const ALL: [KeyValueKind; 4] = [
        Self::Header,
        Self::SearchParam,
        Self::BodyForm,
        Self::BodyUrlEncoded,
    ];

    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Header => "http_header",
            Self::SearchParam => "http_search_param",
            Self::BodyForm => "http_body_form",
            Self::BodyUrlEncoded => "http_body_urlencoded",
        }
    }

    /// Entity family name used to build RPC method names.
    #[must_use]
    pub const fn family(self) -> &'static str {
        match self {
            Self::Header => "HttpHeader",
            Self::SearchParam => "HttpSearchParam",
            Self::BodyForm => "HttpBodyFormData",
            Self::BodyUrlEncoded => "HttpBodyUrlEncoded",
        }
    }

    /// Label of the delta rows of this family, e.g. `HttpHeaderDelta`.
    #[must_use]
    pub const fn delta_family(self) -> &'static str {
        match self {
            Self::Header => "HttpHeaderDelta",
            Self::SearchParam => "HttpSearchParamDelta",
            Self::BodyForm => "HttpBodyFormDataDelta",
            Self::BodyUrlEncoded => "HttpBodyUrlEncodedDelta",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Header => 0,
            Self::SearchParam => 1,
            Self::BodyForm => 2,
            Self::BodyUrlEncoded => 3,
        }
    }
}

impl fmt::Display for KeyValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

/// A header, search parameter, form field or url-encoded field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpKeyValue {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
    pub is_delta: bool,
    pub parent_id: Option<Id>,
    pub delta_key: Option<String>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HttpKeyValue {
    pub fn validate(&self) -> Result<()> {
        if !self.is_delta && (self.parent_id.is_some() || self.has_overrides()) {
            return Err(Error::Constraint(
                "override fields are only allowed on delta rows".into(),
            ));
        }
        Ok(())
    }

    fn has_overrides(&self) -> bool {
        self.delta_key.is_some()
            || self.delta_value.is_some()
            || self.delta_enabled.is_some()
            || self.delta_description.is_some()
            || self.delta_display_order.is_some()
    }
}
