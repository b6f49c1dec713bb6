mod extract;
mod response;
mod router;
mod rpc;
mod sync;

pub use extract::RpcJson;
pub use response::{ApiError, ErrorBody};
pub use router::{AppState, RPC_PREFIX, create_router};
