pub mod chat;
pub mod history;
pub mod messages;
pub mod search;
pub mod shared;
