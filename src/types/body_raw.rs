use std::io::Read;

use flate2::read::GzDecoder;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use super::Id;
use super::http::sql_code_enum;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressionType {
    #[default]
    None,
    Gzip,
}

impl CompressionType {
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Gzip),
            _ => None,
        }
    }

    /// Inflates `data` according to this compression type.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Gzip => {
                let mut out = Vec::new();
                GzDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| Error::invalid(format!("raw body is not valid gzip: {e}")))?;
                Ok(out)
            }
        }
    }
}

sql_code_enum!(CompressionType);

/// The raw body of a template; at most one per HTTP entry.
///
/// On a delta row `delta_raw_data` is the override: `None` inherits the
/// parent body, `Some(vec![])` is an explicit empty body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpBodyRaw {
    pub id: Id,
    pub http_id: Id,
    pub raw_data: Vec<u8>,
    pub compression_type: CompressionType,
    pub is_delta: bool,
    pub parent_body_raw_id: Option<Id>,
    pub delta_raw_data: Option<Vec<u8>>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HttpBodyRaw {
    pub fn validate(&self) -> Result<()> {
        if !self.is_delta && (self.parent_body_raw_id.is_some() || self.delta_raw_data.is_some()) {
            return Err(Error::Constraint(
                "override fields are only allowed on delta rows".into(),
            ));
        }
        Ok(())
    }
}
