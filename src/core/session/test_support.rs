use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::adapters::chatdb::{ChatDb, SqliteChatStore};
use crate::core::error::StoreError;
use crate::core::ports::store::{ChatHistory, ChatStorePort, Message};

/// In-memory store that counts writes and can hold back reads.
///
/// `gated` holds message reads for one chat until notified.
/// `hold_next_history_list` lets the next listing read its rows, then waits
/// before returning them.
pub(crate) struct TestStore {
    inner: SqliteChatStore,
    writes: AtomicUsize,
    gate: Option<(String, Arc<Notify>)>,
    history_gate: Mutex<Option<Arc<Notify>>>,
    fail_history_lists: AtomicBool,
}

impl TestStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: SqliteChatStore::new(ChatDb::open_in_memory().expect("open in-memory db")),
            writes: AtomicUsize::new(0),
            gate: None,
            history_gate: Mutex::new(None),
            fail_history_lists: AtomicBool::new(false),
        }
    }

    pub(crate) fn gated(chat_id: &str, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some((chat_id.to_string(), gate)),
            ..Self::new()
        }
    }

    pub(crate) fn hold_next_history_list(&self, gate: Arc<Notify>) {
        *self.history_gate.lock().expect("history gate") = Some(gate);
    }

    pub(crate) fn fail_history_lists(&self) {
        self.fail_history_lists.store(true, Ordering::SeqCst);
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ChatStorePort for TestStore {
    fn create_chat_history<'a>(
        &'a self,
        id: &'a str,
        article_title: &'a str,
        article_url: &'a str,
    ) -> BoxFuture<'a, Result<ChatHistory, StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create_chat_history(id, article_title, article_url)
    }

    fn create_message<'a>(
        &'a self,
        id: &'a str,
        chat_id: &'a str,
        text: &'a str,
        sent: bool,
    ) -> BoxFuture<'a, Result<Message, StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create_message(id, chat_id, text, sent)
    }

    fn get_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Message>, StoreError>> {
        self.inner.get_message(id)
    }

    fn get_all_messages(&self) -> BoxFuture<'_, Result<Vec<Message>, StoreError>> {
        self.inner.get_all_messages()
    }

    fn get_messages_by_chat_id<'a>(
        &'a self,
        chat_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Message>, StoreError>> {
        Box::pin(async move {
            if let Some((gated_id, gate)) = &self.gate {
                if gated_id == chat_id {
                    gate.notified().await;
                }
            }
            self.inner.get_messages_by_chat_id(chat_id).await
        })
    }

    fn update_message<'a>(
        &'a self,
        id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_message(id, text)
    }

    fn delete_message<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_message(id)
    }

    fn get_chat_history_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<ChatHistory>, StoreError>> {
        self.inner.get_chat_history_by_id(id)
    }

    fn get_all_chat_histories(&self) -> BoxFuture<'_, Result<Vec<ChatHistory>, StoreError>> {
        Box::pin(async move {
            if self.fail_history_lists.load(Ordering::SeqCst) {
                return Err(StoreError::Worker("history listing unavailable".to_string()));
            }
            let gate = self.history_gate.lock().expect("history gate").take();
            let histories = self.inner.get_all_chat_histories().await;
            if let Some(gate) = gate {
                gate.notified().await;
            }
            histories
        })
    }

    fn update_chat_history<'a>(
        &'a self,
        id: &'a str,
        article_title: &'a str,
        article_url: &'a str,
    ) -> BoxFuture<'a, Result<usize, StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update_chat_history(id, article_title, article_url)
    }

    fn delete_chat_history<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<usize, StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_chat_history(id)
    }

    fn reset(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.reset()
    }
}
