mod middleware;
mod token;

pub use middleware::{RequireUser, authenticate};
pub use token::{TokenGenerator, parse_token};
