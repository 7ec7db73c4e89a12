pub mod audit;
pub mod auth;
pub mod headers;
pub mod sanitize;
