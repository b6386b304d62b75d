pub mod commands;
pub mod community_engine;
pub mod error;
pub mod rate_limiter;
pub mod session;
pub mod state;
pub mod store;
pub mod validation;
