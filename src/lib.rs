pub mod config;
pub mod errors;
pub mod llm;
pub mod logging;
pub mod nutrition;
pub mod tracker;
pub mod ui;
pub mod util;
