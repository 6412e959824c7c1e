pub mod batch;
pub mod config;
pub mod effects;
pub mod fatal;
pub mod interactive;
pub mod logging;
pub mod session;
