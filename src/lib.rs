// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod health;
pub mod passage;
pub mod runtime;
pub mod seeds;
pub mod session;
pub mod store;
pub mod tokenizer;
pub mod util;
