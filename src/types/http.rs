use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::Id;
use crate::error::{Error, Result};

/// Request method. `Unspecified` is the zero value and what a cleared
/// method override resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    #[default]
    Unspecified,
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    #[serde(rename = "OPTION")]
    Options,
    Connect,
}

impl HttpMethod {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Unspecified => 0,
            Self::Get => 1,
            Self::Post => 2,
            Self::Put => 3,
            Self::Patch => 4,
            Self::Delete => 5,
            Self::Head => 6,
            Self::Options => 7,
            Self::Connect => 8,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::Get,
            2 => Self::Post,
            3 => Self::Put,
            4 => Self::Patch,
            5 => Self::Delete,
            6 => Self::Head,
            7 => Self::Options,
            8 => Self::Connect,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "",
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
        }
    }
}

/// Which child collection supplies the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyKind {
    #[default]
    None,
    Raw,
    FormData,
    UrlEncoded,
}

impl BodyKind {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Raw => 1,
            Self::FormData => 2,
            Self::UrlEncoded => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Raw,
            2 => Self::FormData,
            3 => Self::UrlEncoded,
            _ => return None,
        })
    }
}

macro_rules! sql_code_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.code()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let code = value.as_i64()?;
                Self::from_code(code).ok_or(FromSqlError::OutOfRange(code))
            }
        }
    };
}

pub(crate) use sql_code_enum;

sql_code_enum!(HttpMethod);
sql_code_enum!(BodyKind);

/// A request template. Delta entries (`is_delta`) point at a base entry via
/// `parent_http_id` and carry only the `delta_*` overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Http {
    pub id: Id,
    pub workspace_id: Id,
    pub folder_id: Option<Id>,
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub description: String,
    pub body_kind: BodyKind,
    pub is_delta: bool,
    pub is_snapshot: bool,
    pub parent_http_id: Option<Id>,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<HttpMethod>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Http {
    /// Checks the row-level invariants of a template.
    pub fn validate(&self) -> Result<()> {
        if self.is_delta && self.is_snapshot {
            return Err(Error::Constraint(
                "an entry cannot be both a delta and a snapshot".into(),
            ));
        }
        if self.is_delta && self.parent_http_id.is_none() {
            return Err(Error::Constraint("a delta entry requires a parent".into()));
        }
        if !self.is_delta
            && (self.parent_http_id.is_some()
                || self.delta_name.is_some()
                || self.delta_url.is_some()
                || self.delta_method.is_some())
        {
            return Err(Error::Constraint(
                "override fields are only allowed on delta entries".into(),
            ));
        }
        Ok(())
    }

    /// Whether this entry can serve as the parent of a delta.
    #[must_use]
    pub fn is_base(&self) -> bool {
        !self.is_delta && !self.is_snapshot
    }
}
