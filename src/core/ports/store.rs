use futures::future::BoxFuture;

use crate::core::error::StoreError;

pub use crate::adapters::chatdb::{ChatHistory, Message};

/// CRUD over chat histories and their messages.
///
/// Listing operations return newest first. Mutations report the number of
/// affected rows so a missing target is visible to the caller as `0`.
pub trait ChatStorePort: Send + Sync {
    fn create_chat_history<'a>(
        &'a self,
        id: &'a str,
        article_title: &'a str,
        article_url: &'a str,
    ) -> BoxFuture<'a, Result<ChatHistory, StoreError>>;

    fn create_message<'a>(
        &'a self,
        id: &'a str,
        chat_id: &'a str,
        text: &'a str,
        sent: bool,
    ) -> BoxFuture<'a, Result<Message, StoreError>>;

    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Message>, StoreError>>;

    fn get_all_messages(&self) -> BoxFuture<'_, Result<Vec<Message>, StoreError>>;

    fn get_messages_by_chat_id<'a>(
        &'a self,
        chat_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Message>, StoreError>>;

    fn update_message<'a>(
        &'a self,
        id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<usize, StoreError>>;

    fn delete_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<usize, StoreError>>;

    fn get_chat_history_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ChatHistory>, StoreError>>;

    fn get_all_chat_histories(&self) -> BoxFuture<'_, Result<Vec<ChatHistory>, StoreError>>;

    fn update_chat_history<'a>(
        &'a self,
        id: &'a str,
        article_title: &'a str,
        article_url: &'a str,
    ) -> BoxFuture<'a, Result<usize, StoreError>>;

    fn delete_chat_history<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<usize, StoreError>>;

    /// Drops and recreates both tables. Nothing survives.
    fn reset(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}
