pub mod answer;
pub mod emitter;
pub mod search;
pub mod store;
