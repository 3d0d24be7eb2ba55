pub mod background;
pub mod cli;
pub mod commands;
pub mod config;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod retry;
pub mod script;
pub mod speech;
pub mod subtitles;
pub mod support;

pub use cli::EngineCommands;
pub use commands::handle_engine_command;
