mod assert;
mod body_raw;
mod http;
mod id;
mod key_value;
mod permission;
mod response;
mod workspace;

pub use assert::HttpAssert;
pub use body_raw::{CompressionType, HttpBodyRaw};
pub use http::{BodyKind, Http, HttpMethod};
pub use id::{ID_LEN, Id, now_ms};
pub use key_value::{HttpKeyValue, KeyValueKind};
pub use permission::Permission;
pub use response::{HttpResponse, HttpResponseAssert, HttpResponseHeader, HttpVersion};
pub use workspace::{Role, Token, User, Workspace};
