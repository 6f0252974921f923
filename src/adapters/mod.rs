pub mod answer;
pub mod chatdb;
pub mod config;
pub mod emitter;
pub mod wikipedia;
