pub mod check;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod findings;
pub mod logging;
pub mod target;
