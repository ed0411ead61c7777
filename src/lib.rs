// Library surface for headless/integration tests and reuse.
// main.rs only wires the terminal; everything testable lives here.
pub mod app;
pub mod config;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod runtime;
pub mod store;
pub mod study;
pub mod swipe;
pub mod ui;
pub mod writeback;
