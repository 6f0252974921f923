use crate::adapters::config::Settings;
use crate::core::ports::store::ChatStorePort;

use super::super::CliError;
use super::shared::open_store;

pub async fn edit(settings: &Settings, message_id: &str, text: &str) -> Result<(), CliError> {
    if text.trim().is_empty() {
        return Err(CliError::Usage("message text is empty".to_string()));
    }
    let store = open_store(settings)?;
    if store.update_message(message_id, text).await? == 0 {
        return Err(CliError::Usage(format!("no message with id {message_id}")));
    }
    println!("updated {message_id}");
    Ok(())
}

pub async fn delete(settings: &Settings, message_id: &str) -> Result<(), CliError> {
    let store = open_store(settings)?;
    if store.delete_message(message_id).await? == 0 {
        return Err(CliError::Usage(format!("no message with id {message_id}")));
    }
    println!("deleted {message_id}");
    Ok(())
}
