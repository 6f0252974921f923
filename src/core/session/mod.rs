pub mod controller;
mod events;
pub mod history;
pub mod selection;
#[cfg(test)]
mod test_support;

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::core::error::ChatError;
use crate::core::ports::answer::AnswerPort;
use crate::core::ports::emitter::EmitterPort;
use crate::core::ports::search::SearchResult;
use crate::core::ports::store::{ChatHistory, ChatStorePort};

pub use controller::{ChatController, ChatView, ControllerState};
pub use history::{CacheState, HistoryCache};
pub use selection::{Selection, SelectionChange};

/// One running client: the store, the shared selection, the history list
/// and the chat pane that follows the selection.
///
/// Must be created inside a tokio runtime: the pane follows selection
/// changes from any writer through a background task.
pub struct Session {
    store: Arc<dyn ChatStorePort>,
    selection: Selection,
    history: HistoryCache,
    controller: Arc<ChatController>,
    follower: JoinHandle<()>,
}

fn spawn_follower(selection: &Selection, controller: Arc<ChatController>) -> JoinHandle<()> {
    let mut changes = selection.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            controller.follow_selection().await;
        }
    })
}

impl Session {
    pub fn new(
        store: Arc<dyn ChatStorePort>,
        answers: Arc<dyn AnswerPort>,
        emitter: Arc<dyn EmitterPort>,
    ) -> Self {
        let selection = Selection::new();
        let controller = Arc::new(ChatController::new(
            store.clone(),
            answers,
            emitter,
            selection.clone(),
        ));
        let follower = spawn_follower(&selection, controller.clone());
        Self {
            history: HistoryCache::new(store.clone()),
            store,
            selection,
            controller,
            follower,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    pub fn controller(&self) -> &Arc<ChatController> {
        &self.controller
    }

    /// Opens a new chat anchored to `article` and makes it the active one.
    pub async fn start_chat(&self, article: &SearchResult) -> Result<ChatHistory, ChatError> {
        let id = uuid::Uuid::new_v4().to_string();
        let history = self
            .store
            .create_chat_history(&id, &article.title, &article.url)
            .await?;
        log::info!("started chat {} for {}", history.id, history.article_url);

        self.select(Some(history.id.clone())).await;
        if let Err(error) = self.history.refresh().await {
            log::warn!("history list not refreshed after starting {}: {}", history.id, error);
        }
        Ok(history)
    }

    /// Writes the selection and waits until the pane has caught up with it.
    pub async fn select(&self, chat_id: Option<String>) -> SelectionChange {
        let change = self.selection.set(chat_id);
        self.controller.follow_selection().await;
        change
    }

    /// Deletes a chat with its messages. Returns `false` when it did not exist.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<bool, ChatError> {
        let deleted = self.store.delete_chat_history(chat_id).await?;
        if self.selection.is_current(chat_id) {
            self.select(None).await;
        }
        self.history.refresh().await?;
        Ok(deleted > 0)
    }

    pub async fn nuke(&self) -> Result<(), ChatError> {
        self.history.nuke().await?;
        self.select(None).await;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.follower.abort();
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;

    use super::test_support::TestStore;
    use super::{ControllerState, SelectionChange, Session};
    use crate::adapters::chatdb::{ChatDb, SqliteChatStore};
    use crate::core::error::NetworkError;
    use crate::core::ports::answer::{AnswerPort, AnswerRequest, AnswerResponse};
    use crate::core::ports::emitter::EmitterPort;
    use crate::core::ports::search::SearchResult;
    use crate::core::ports::store::ChatStorePort;

    struct EchoAnswers;

    impl AnswerPort for EchoAnswers {
        fn ask<'a>(
            &'a self,
            request: &'a AnswerRequest,
        ) -> BoxFuture<'a, Result<AnswerResponse, NetworkError>> {
            Box::pin(async move {
                Ok(AnswerResponse {
                    answer: format!("you asked: {}", request.question),
                    context: None,
                })
            })
        }
    }

    struct Silent;

    impl EmitterPort for Silent {
        fn emit(&self, _channel: &str, _payload: &Value) {}
    }

    fn session() -> (Session, Arc<SqliteChatStore>) {
        let store = Arc::new(SqliteChatStore::new(
            ChatDb::open_in_memory().expect("open in-memory db"),
        ));
        let session = Session::new(store.clone(), Arc::new(EchoAnswers), Arc::new(Silent));
        (session, store)
    }

    fn quasi_war() -> SearchResult {
        SearchResult {
            title: "Quasi-War".to_string(),
            url: "https://en.wikipedia.org/wiki/Quasi-War".to_string(),
        }
    }

    #[tokio::test]
    async fn start_chat_selects_and_lists_the_new_history() {
        let (session, _store) = session();

        let history = session.start_chat(&quasi_war()).await.expect("start chat");

        assert_eq!(session.selection().current(), Some(history.id.clone()));
        assert_eq!(session.controller().state(), ControllerState::Ready);
        assert_eq!(
            session.controller().header_title(),
            Some("Quasi-War".to_string())
        );
        let listed = session.history().histories().expect("loaded");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, history.id);
    }

    #[tokio::test]
    async fn reselecting_the_same_chat_does_not_reload() {
        let (session, _store) = session();
        let history = session.start_chat(&quasi_war()).await.expect("start chat");
        session
            .controller()
            .submit("When did it start?")
            .await
            .expect("answered");

        let change = session.select(Some(history.id.clone())).await;

        assert_eq!(change, SelectionChange::Unchanged);
        assert_eq!(session.controller().view().messages.len(), 2);
    }

    #[tokio::test]
    async fn deleting_the_active_chat_cascades_and_clears_selection() {
        let (session, store) = session();
        let history = session.start_chat(&quasi_war()).await.expect("start chat");
        session
            .controller()
            .submit("When did it start?")
            .await
            .expect("answered");

        assert!(session.delete_chat(&history.id).await.expect("delete"));
        assert!(!session.delete_chat(&history.id).await.expect("delete again"));

        assert_eq!(session.selection().current(), None);
        assert_eq!(session.controller().state(), ControllerState::NoSelection);
        assert!(store
            .get_messages_by_chat_id(&history.id)
            .await
            .expect("read")
            .is_empty());
        assert_eq!(session.history().histories(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn nuke_forgets_everything() {
        let (session, store) = session();
        let history = session.start_chat(&quasi_war()).await.expect("start chat");
        session
            .controller()
            .submit("When did it start?")
            .await
            .expect("answered");

        session.nuke().await.expect("nuke");

        assert_eq!(session.selection().current(), None);
        assert_eq!(session.history().histories(), Some(Vec::new()));
        assert!(store
            .get_chat_history_by_id(&history.id)
            .await
            .expect("lookup")
            .is_none());
        assert!(store.get_all_messages().await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn writes_through_a_shared_selection_reload_the_pane() {
        let (session, store) = session();
        store
            .create_chat_history("h1", "Quasi-War", "https://en.wikipedia.org/wiki/Quasi-War")
            .await
            .expect("create history");

        let elsewhere = session.selection().clone();
        elsewhere.set(Some("h1".to_string()));

        tokio::time::timeout(Duration::from_secs(5), async {
            while session.controller().state() != ControllerState::Ready {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pane follows the selection");
        assert_eq!(
            session.controller().header_title(),
            Some("Quasi-War".to_string())
        );
        session
            .controller()
            .submit("When did it start?")
            .await
            .expect("answered");

        elsewhere.set(None);
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.controller().state() != ControllerState::NoSelection {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pane clears with the selection");
    }

    #[tokio::test]
    async fn start_chat_survives_a_failed_history_refresh() {
        let store = Arc::new(TestStore::new());
        store.fail_history_lists();
        let session = Session::new(store.clone(), Arc::new(EchoAnswers), Arc::new(Silent));

        let history = session.start_chat(&quasi_war()).await.expect("start chat");

        assert_eq!(session.selection().current(), Some(history.id.clone()));
        assert_eq!(session.controller().state(), ControllerState::Ready);
        assert_eq!(session.history().histories(), None);
        assert!(store
            .get_chat_history_by_id(&history.id)
            .await
            .expect("lookup")
            .is_some());
    }
}
