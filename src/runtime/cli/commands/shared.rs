use std::sync::Arc;

use crate::adapters::answer::HttpAnswerClient;
use crate::adapters::chatdb::SqliteChatStore;
use crate::adapters::config::Settings;
use crate::adapters::emitter::ConsoleEmitter;
use crate::core::ports::store::{ChatHistory, Message};
use crate::core::session::Session;

use super::super::CliError;

pub fn open_store(settings: &Settings) -> Result<Arc<SqliteChatStore>, CliError> {
    let db_path = settings.db_path();
    log::debug!("opening chat store at {}", db_path.display());
    Ok(Arc::new(SqliteChatStore::open(&db_path)?))
}

pub fn build_session(settings: &Settings) -> Result<(Session, Arc<SqliteChatStore>), CliError> {
    let store = open_store(settings)?;
    let answers = HttpAnswerClient::new(&settings.answer_endpoint, settings.answer_timeout())?;
    let session = Session::new(store.clone(), Arc::new(answers), Arc::new(ConsoleEmitter));
    Ok((session, store))
}

pub fn print_history_line(index: usize, history: &ChatHistory) {
    println!(
        "{:>3}. {}  [{}]  {}",
        index + 1,
        history.article_title,
        history.id,
        history.article_url
    );
}

pub fn print_message(message: &Message) {
    let who = if message.sent { "you" } else { "wiki" };
    println!("{who:>4} > {}", message.text);
}

/// Accepts either a 1-based position in `histories` or a literal id.
pub fn resolve_history_ref(histories: &[ChatHistory], reference: &str) -> Option<String> {
    let reference = reference.trim();
    if let Ok(position) = reference.parse::<usize>() {
        if let Some(history) = position.checked_sub(1).and_then(|i| histories.get(i)) {
            return Some(history.id.clone());
        }
    }
    histories
        .iter()
        .find(|history| history.id == reference)
        .map(|history| history.id.clone())
}

#[cfg(test)]
mod tests {
    use super::resolve_history_ref;
    use crate::core::ports::store::ChatHistory;

    fn history(id: &str) -> ChatHistory {
        ChatHistory {
            id: id.to_string(),
            article_title: id.to_uppercase(),
            article_url: format!("https://en.wikipedia.org/wiki/{id}"),
            created_at: String::new(),
            modified_at: String::new(),
        }
    }

    #[test]
    fn resolves_positions_and_ids() {
        let histories = vec![history("a"), history("b")];
        assert_eq!(resolve_history_ref(&histories, "2"), Some("b".to_string()));
        assert_eq!(resolve_history_ref(&histories, " a "), Some("a".to_string()));
        assert_eq!(resolve_history_ref(&histories, "0"), None);
        assert_eq!(resolve_history_ref(&histories, "3"), None);
        assert_eq!(resolve_history_ref(&histories, "c"), None);
    }
}
