use bytesize::MB;

pub mod disclosure;
pub mod envelope;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod warp;

pub const DEFAULT_MAX_JSON_BODY_SIZE: u64 = 10 * MB;
