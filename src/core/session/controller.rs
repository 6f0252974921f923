use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::adapters::chatdb::now_timestamp;
use crate::core::error::{ChatError, StoreError};
use crate::core::ports::answer::{AnswerPort, AnswerRequest};
use crate::core::ports::emitter::EmitterPort;
use crate::core::ports::store::{ChatHistory, ChatStorePort, Message};

use super::events::{emit_error, emit_message, emit_state};
use super::selection::Selection;

pub const NO_SELECTION_MESSAGE: &str = "Please choose an article or chat history!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    NoSelection,
    Loading,
    Ready,
    Submitting,
}

impl ControllerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ControllerState::NoSelection => "no_selection",
            ControllerState::Loading => "loading",
            ControllerState::Ready => "ready",
            ControllerState::Submitting => "submitting",
        }
    }
}

/// What a chat surface renders: messages oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ChatView {
    pub state: ControllerState,
    pub chat_id: Option<String>,
    pub chat_history: Option<ChatHistory>,
    pub messages: Vec<Message>,
    pub draft: String,
}

#[derive(Debug)]
struct ChatPane {
    state: ControllerState,
    chat_id: Option<String>,
    chat_history: Option<ChatHistory>,
    messages: Vec<Message>,
    draft: String,
    load_seq: u64,
    // Chats with a question awaiting its answer, kept across loads.
    in_flight: HashSet<String>,
}

impl ChatPane {
    fn settled_state(&self, chat_id: &str) -> ControllerState {
        if self.in_flight.contains(chat_id) {
            ControllerState::Submitting
        } else {
            ControllerState::Ready
        }
    }
}

impl Default for ChatPane {
    fn default() -> Self {
        Self {
            state: ControllerState::NoSelection,
            chat_id: None,
            chat_history: None,
            messages: Vec::new(),
            draft: String::new(),
            load_seq: 0,
            in_flight: HashSet::new(),
        }
    }
}

pub struct ChatController {
    store: Arc<dyn ChatStorePort>,
    answers: Arc<dyn AnswerPort>,
    emitter: Arc<dyn EmitterPort>,
    selection: Selection,
    pane: Mutex<ChatPane>,
    followed: tokio::sync::Mutex<Option<String>>,
}

impl ChatController {
    pub fn new(
        store: Arc<dyn ChatStorePort>,
        answers: Arc<dyn AnswerPort>,
        emitter: Arc<dyn EmitterPort>,
        selection: Selection,
    ) -> Self {
        Self {
            store,
            answers,
            emitter,
            selection,
            pane: Mutex::new(ChatPane::default()),
            followed: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.lock_pane().state
    }

    pub fn view(&self) -> ChatView {
        let pane = self.lock_pane();
        ChatView {
            state: pane.state,
            chat_id: pane.chat_id.clone(),
            chat_history: pane.chat_history.clone(),
            messages: pane.messages.clone(),
            draft: pane.draft.clone(),
        }
    }

    pub fn header_title(&self) -> Option<String> {
        self.lock_pane()
            .chat_history
            .as_ref()
            .map(|history| history.article_title.clone())
    }

    pub fn draft(&self) -> String {
        self.lock_pane().draft.clone()
    }

    pub fn set_draft(&self, text: &str) {
        self.lock_pane().draft = text.to_string();
    }

    /// Brings the pane in line with the shared selection: loads a newly
    /// selected chat, clears the pane when the selection was cleared, and
    /// does nothing when the selection already is what the pane follows.
    ///
    /// Calls are serialized and return once the pane matches the selection
    /// as of the last change seen.
    pub async fn follow_selection(&self) {
        let mut followed = self.followed.lock().await;
        loop {
            let current = self.selection.current();
            if *followed == current {
                return;
            }
            *followed = current.clone();
            match current {
                Some(chat_id) => {
                    self.load(&chat_id).await;
                }
                None => self.clear(),
            }
        }
    }

    /// Loads `chat_id` into the pane. Returns `false` when the result arrived
    /// after the selection moved on and was discarded.
    pub async fn load(&self, chat_id: &str) -> bool {
        let seq = {
            let mut pane = self.lock_pane();
            pane.load_seq += 1;
            pane.state = ControllerState::Loading;
            pane.chat_id = Some(chat_id.to_string());
            pane.chat_history = None;
            pane.messages.clear();
            pane.load_seq
        };
        emit_state(self.emitter.as_ref(), ControllerState::Loading, Some(chat_id));

        let (messages, history) = tokio::join!(
            self.store.get_messages_by_chat_id(chat_id),
            self.store.get_chat_history_by_id(chat_id),
        );

        let (next_state, error) = {
            let mut pane = self.lock_pane();
            if pane.load_seq != seq || !self.selection.is_current(chat_id) {
                log::debug!("discarding stale load for chat {}", chat_id);
                return false;
            }

            match (messages, history) {
                (Ok(mut messages), Ok(Some(history))) => {
                    messages.reverse();
                    pane.messages = messages;
                    pane.chat_history = Some(history);
                    pane.state = pane.settled_state(chat_id);
                    (pane.state, None)
                }
                (Ok(_), Ok(None)) => {
                    pane.state = ControllerState::NoSelection;
                    pane.chat_id = None;
                    let error = StoreError::NotFound {
                        entity: "chat history",
                        id: chat_id.to_string(),
                    };
                    (ControllerState::NoSelection, Some(ChatError::Store(error)))
                }
                (Err(error), history) => {
                    pane.chat_history = history.ok().flatten();
                    pane.state = pane.settled_state(chat_id);
                    (pane.state, Some(ChatError::Store(error)))
                }
                (Ok(mut messages), Err(error)) => {
                    messages.reverse();
                    pane.messages = messages;
                    pane.state = pane.settled_state(chat_id);
                    (pane.state, Some(ChatError::Store(error)))
                }
            }
        };

        if let Some(error) = error {
            log::warn!("failed to load chat {}: {}", chat_id, error);
            emit_error(self.emitter.as_ref(), &error);
        }
        let committed_id = (next_state != ControllerState::NoSelection).then_some(chat_id);
        emit_state(self.emitter.as_ref(), next_state, committed_id);
        true
    }

    /// Empties the pane after the selection was cleared.
    pub fn clear(&self) {
        {
            let mut pane = self.lock_pane();
            let draft = std::mem::take(&mut pane.draft);
            let in_flight = std::mem::take(&mut pane.in_flight);
            let load_seq = pane.load_seq + 1;
            *pane = ChatPane {
                draft,
                load_seq,
                in_flight,
                ..ChatPane::default()
            };
        }
        emit_state(self.emitter.as_ref(), ControllerState::NoSelection, None);
    }

    pub async fn submit_draft(&self) -> Result<Message, ChatError> {
        let draft = self.draft();
        self.submit(&draft).await
    }

    /// Sends `question` for the selected chat and returns the stored answer.
    ///
    /// The question is appended to the pane and written to the store before
    /// the endpoint is called, so it survives a failed round trip.
    pub async fn submit(&self, question: &str) -> Result<Message, ChatError> {
        let result = self.submit_inner(question).await;
        if let Err(error) = &result {
            log::warn!("question not answered: {}", error);
            emit_error(self.emitter.as_ref(), error);
        }
        result
    }

    async fn submit_inner(&self, question: &str) -> Result<Message, ChatError> {
        if question.trim().is_empty() {
            return Err(ChatError::validation("Please enter a question!"));
        }

        let (chat_id, article_url, question_message) = {
            let mut pane = self.lock_pane();
            let chat_id = self
                .selection
                .current()
                .ok_or_else(|| ChatError::validation(NO_SELECTION_MESSAGE))?;

            match pane.state {
                ControllerState::Ready => {}
                ControllerState::NoSelection => {
                    return Err(ChatError::validation(NO_SELECTION_MESSAGE));
                }
                ControllerState::Loading => {
                    return Err(ChatError::validation("The chat is still loading."));
                }
                ControllerState::Submitting => {
                    return Err(ChatError::validation(
                        "Still waiting for the previous answer.",
                    ));
                }
            }

            let article_url = pane
                .chat_history
                .as_ref()
                .filter(|history| history.id == chat_id)
                .map(|history| history.article_url.clone())
                .ok_or_else(|| ChatError::validation(NO_SELECTION_MESSAGE))?;

            let message = local_message(&chat_id, question, true);
            pane.messages.push(message.clone());
            pane.draft.clear();
            pane.state = ControllerState::Submitting;
            pane.in_flight.insert(chat_id.clone());
            (chat_id, article_url, message)
        };
        emit_state(
            self.emitter.as_ref(),
            ControllerState::Submitting,
            Some(&chat_id),
        );
        emit_message(self.emitter.as_ref(), &question_message);

        self.persist(&question_message).await;

        let request = AnswerRequest {
            article: article_url,
            question: question_message.text.clone(),
        };
        match self.answers.ask(&request).await {
            Ok(response) => {
                let answer = local_message(&chat_id, &response.answer, false);
                self.persist(&answer).await;
                self.finish_submission(&chat_id, Some(answer.clone()));
                emit_message(self.emitter.as_ref(), &answer);
                Ok(answer)
            }
            Err(error) => {
                self.finish_submission(&chat_id, None);
                Err(ChatError::Network(error))
            }
        }
    }

    async fn persist(&self, message: &Message) {
        let stored = self
            .store
            .create_message(&message.id, &message.chat_id, &message.text, message.sent)
            .await;
        if let Err(error) = stored {
            log::warn!("failed to store message {}: {}", message.id, error);
            emit_error(self.emitter.as_ref(), &ChatError::Store(error));
        }
    }

    fn finish_submission(&self, chat_id: &str, answer: Option<Message>) {
        let settled = {
            let mut pane = self.lock_pane();
            pane.in_flight.remove(chat_id);
            let displayed = pane.chat_id.as_deref() == Some(chat_id)
                && self.selection.is_current(chat_id);
            if !displayed {
                log::debug!("answer for chat {} arrived after it was left", chat_id);
                false
            } else {
                if let Some(answer) = answer {
                    pane.messages.push(answer);
                }
                if pane.state == ControllerState::Submitting {
                    pane.state = ControllerState::Ready;
                    true
                } else {
                    false
                }
            }
        };
        if settled {
            emit_state(self.emitter.as_ref(), ControllerState::Ready, Some(chat_id));
        }
    }

    fn lock_pane(&self) -> MutexGuard<'_, ChatPane> {
        self.pane
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn local_message(chat_id: &str, text: &str, sent: bool) -> Message {
    let now = now_timestamp();
    Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        text: text.to_string(),
        sent,
        created_at: now.clone(),
        modified_at: now,
    }
}
