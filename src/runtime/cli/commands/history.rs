use crate::adapters::config::Settings;
use crate::core::ports::search::SearchResult;
use crate::core::ports::store::ChatStorePort;

use super::super::CliError;
use super::shared::{build_session, open_store, print_history_line, print_message};

pub async fn new_chat(settings: &Settings, title: &str, url: &str) -> Result<(), CliError> {
    let (title, url) = (title.trim(), url.trim());
    if title.is_empty() || url.is_empty() {
        return Err(CliError::Usage(
            "an article needs both a title and a url".to_string(),
        ));
    }
    let (session, _) = build_session(settings)?;
    let history = session
        .start_chat(&SearchResult {
            title: title.to_string(),
            url: url.to_string(),
        })
        .await?;
    println!("{}", history.id);
    Ok(())
}

pub async fn list(settings: &Settings) -> Result<(), CliError> {
    let (session, _) = build_session(settings)?;
    let histories = session.history().ensure_loaded().await?;
    if histories.is_empty() {
        println!("no chats yet");
    }
    for (index, history) in histories.iter().enumerate() {
        print_history_line(index, history);
    }
    Ok(())
}

pub async fn show(settings: &Settings, chat_id: &str) -> Result<(), CliError> {
    let store = open_store(settings)?;
    let history = store
        .get_chat_history_by_id(chat_id)
        .await?
        .ok_or_else(|| CliError::Usage(format!("no chat with id {chat_id}")))?;

    println!("== {} ==", history.article_title);
    println!("{}", history.article_url);
    let mut messages = store.get_messages_by_chat_id(chat_id).await?;
    messages.reverse();
    for message in &messages {
        print_message(message);
    }
    Ok(())
}

pub async fn delete(settings: &Settings, chat_id: &str) -> Result<(), CliError> {
    let (session, _) = build_session(settings)?;
    if !session.delete_chat(chat_id).await? {
        return Err(CliError::Usage(format!("no chat with id {chat_id}")));
    }
    println!("deleted {chat_id}");
    Ok(())
}

pub async fn nuke(settings: &Settings, confirmed: bool) -> Result<(), CliError> {
    if !confirmed {
        return Err(CliError::Usage(
            "this drops every chat and message; pass --yes to confirm".to_string(),
        ));
    }
    let (session, _) = build_session(settings)?;
    session.nuke().await?;
    log::info!("chat database reset");
    println!("all chats removed");
    Ok(())
}
