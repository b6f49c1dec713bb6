mod server;

pub use server::{LagPolicy, ServerConfig, StreamConfig};
