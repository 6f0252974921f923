use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adapters::config::Settings;
use crate::adapters::wikipedia::SearchDebouncer;
use crate::core::ports::search::SearchResult;
use crate::core::ports::store::{ChatHistory, ChatStorePort};
use crate::core::session::{ChatView, ControllerState, Session, SelectionChange};

use super::super::CliError;
use super::search::{client as search_client, print_results};
use super::shared::{build_session, print_history_line, print_message, resolve_history_ref};

const SEARCH_WAIT: Duration = Duration::from_secs(15);

const HELP: &str = "\
/search <term>   find Wikipedia articles
/open <n>        start a chat about search result n
/history         list saved chats
/select <n|id>   switch to a saved chat
/delete <n|id>   delete a saved chat
/show            print the current chat
/nuke            delete every chat
/help            this text
/quit            leave
anything else is asked about the selected article";

#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Empty,
    Help,
    Quit,
    Search(&'a str),
    Open(&'a str),
    History,
    Select(&'a str),
    Delete(&'a str),
    Show,
    Nuke,
    Ask(&'a str),
    Unknown(&'a str),
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplCommand::Ask(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "help" | "h" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        "search" | "s" => ReplCommand::Search(arg),
        "open" | "o" => ReplCommand::Open(arg),
        "history" | "list" => ReplCommand::History,
        "select" => ReplCommand::Select(arg),
        "delete" => ReplCommand::Delete(arg),
        "show" => ReplCommand::Show,
        "nuke" => ReplCommand::Nuke,
        _ => ReplCommand::Unknown(name),
    }
}

/// One-shot question for an existing chat.
pub async fn ask(settings: &Settings, chat_id: &str, question: &str) -> Result<(), CliError> {
    let (session, _) = build_session(settings)?;
    session.select(Some(chat_id.to_string())).await;
    if session.controller().state() == ControllerState::NoSelection {
        return Err(CliError::Usage(format!("no chat with id {chat_id}")));
    }
    let answer = session.controller().submit(question).await?;
    print_message(&answer);
    Ok(())
}

/// Prints the article title whenever the selection changes.
fn spawn_header_watcher(
    mut selection: watch::Receiver<Option<String>>,
    store: Arc<dyn ChatStorePort>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while selection.changed().await.is_ok() {
            let current = selection.borrow_and_update().clone();
            let Some(chat_id) = current else {
                println!("== no chat selected ==");
                continue;
            };
            match store.get_chat_history_by_id(&chat_id).await {
                Ok(Some(history)) => println!("== {} ==", history.article_title),
                Ok(None) => log::debug!("selected chat {} has no history row", chat_id),
                Err(error) => log::warn!("header lookup for {} failed: {}", chat_id, error),
            }
        }
    })
}

fn print_view(view: &ChatView) {
    if view.chat_id.is_none() {
        println!("Please choose an article or chat history!");
        return;
    }
    if let Some(history) = &view.chat_history {
        println!("{}", history.article_url);
    }
    if view.messages.is_empty() {
        println!("(no messages yet)");
    }
    for message in &view.messages {
        print_message(message);
    }
}

fn print_histories(histories: &[ChatHistory]) {
    if histories.is_empty() {
        println!("no chats yet, try /search");
    }
    for (index, history) in histories.iter().enumerate() {
        print_history_line(index, history);
    }
}

async fn prompt(session: &Session) -> Result<(), CliError> {
    let label = session
        .controller()
        .header_title()
        .unwrap_or_else(|| "wikichat".to_string());
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{label}> ").as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

struct Repl {
    session: Session,
    debouncer: SearchDebouncer,
    found: Vec<SearchResult>,
    listed: Vec<ChatHistory>,
    lines: Lines<BufReader<Stdin>>,
}

impl Repl {
    async fn refresh_listed(&mut self) -> Result<(), CliError> {
        self.listed = self.session.history().refresh().await?;
        Ok(())
    }

    async fn search(&mut self, term: &str) {
        if term.is_empty() {
            println!("usage: /search <term>");
            return;
        }
        self.debouncer.push(term);
        match tokio::time::timeout(SEARCH_WAIT, self.debouncer.next_batch()).await {
            Ok(Some(batch)) => {
                print_results(&batch.results);
                self.found = batch.results;
            }
            Ok(None) => println!("search stopped"),
            Err(_) => println!("no results for '{term}'"),
        }
    }

    async fn open(&mut self, arg: &str) -> Result<(), CliError> {
        let picked = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.found.get(i))
            .cloned();
        let Some(article) = picked else {
            println!("usage: /open <n> after a /search");
            return Ok(());
        };
        self.session.start_chat(&article).await?;
        self.refresh_listed().await?;
        print_view(&self.session.controller().view());
        Ok(())
    }

    async fn select(&mut self, arg: &str) {
        let Some(chat_id) = resolve_history_ref(&self.listed, arg) else {
            println!("no chat '{arg}', see /history");
            return;
        };
        if self.session.select(Some(chat_id)).await == SelectionChange::Unchanged {
            println!("already selected");
        }
        print_view(&self.session.controller().view());
    }

    async fn delete(&mut self, arg: &str) -> Result<(), CliError> {
        let Some(chat_id) = resolve_history_ref(&self.listed, arg) else {
            println!("no chat '{arg}', see /history");
            return Ok(());
        };
        if self.session.delete_chat(&chat_id).await? {
            println!("deleted {chat_id}");
        }
        self.refresh_listed().await
    }

    async fn nuke(&mut self) -> Result<(), CliError> {
        println!("type 'yes' to delete every chat");
        prompt(&self.session).await?;
        let confirmed = matches!(self.lines.next_line().await?, Some(line) if line.trim() == "yes");
        if !confirmed {
            println!("kept everything");
            return Ok(());
        }
        self.session.nuke().await?;
        self.listed.clear();
        println!("all chats removed");
        Ok(())
    }

    async fn ask(&mut self, question: &str) {
        self.session.controller().set_draft(question);
        match self.session.controller().submit_draft().await {
            Ok(answer) => print_message(&answer),
            // Already surfaced through the emitter.
            Err(error) => log::debug!("submit failed: {}", error),
        }
    }

    /// Returns `false` once the user asked to leave.
    async fn handle(&mut self, line: &str) -> Result<bool, CliError> {
        match parse_line(line) {
            ReplCommand::Empty => {}
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => return Ok(false),
            ReplCommand::Search(term) => self.search(term).await,
            ReplCommand::Open(arg) => self.open(arg).await?,
            ReplCommand::History => {
                self.refresh_listed().await?;
                print_histories(&self.listed);
            }
            ReplCommand::Select(arg) => self.select(arg).await,
            ReplCommand::Delete(arg) => self.delete(arg).await?,
            ReplCommand::Show => print_view(&self.session.controller().view()),
            ReplCommand::Nuke => self.nuke().await?,
            ReplCommand::Ask(question) => self.ask(question).await,
            ReplCommand::Unknown(name) => println!("unknown command /{name}, try /help"),
        }
        Ok(true)
    }
}

pub async fn interactive(settings: &Settings) -> Result<(), CliError> {
    let (session, store) = build_session(settings)?;
    let debouncer = SearchDebouncer::spawn(
        Arc::new(search_client(settings)),
        settings.search_debounce(),
    );
    let header = spawn_header_watcher(session.selection().subscribe(), store);

    let listed = session.history().ensure_loaded().await?;
    print_histories(&listed);
    println!("/help lists commands");

    let mut repl = Repl {
        session,
        debouncer,
        found: Vec::new(),
        listed,
        lines: BufReader::new(tokio::io::stdin()).lines(),
    };

    let outcome = loop {
        if let Err(error) = prompt(&repl.session).await {
            break Err(error);
        }
        let line = match repl.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(error) => break Err(error.into()),
        };
        match repl.handle(&line).await {
            Ok(true) => {}
            Ok(false) => break Ok(()),
            Err(
                error @ (CliError::Chat(_) | CliError::Store(_) | CliError::Network(_)),
            ) => eprintln!("! {error}"),
            Err(error) => break Err(error),
        }
    };

    header.abort();
    outcome
}

#[cfg(test)]
mod tests {
    use super::{parse_line, ReplCommand};

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            parse_line("  When did it start? "),
            ReplCommand::Ask("When did it start?")
        );
        assert_eq!(parse_line("   "), ReplCommand::Empty);
    }

    #[test]
    fn slash_commands_take_trimmed_arguments() {
        assert_eq!(parse_line("/search  quasi war "), ReplCommand::Search("quasi war"));
        assert_eq!(parse_line("/open 2"), ReplCommand::Open("2"));
        assert_eq!(parse_line("/select"), ReplCommand::Select(""));
        assert_eq!(parse_line("/q"), ReplCommand::Quit);
        assert_eq!(parse_line("/history"), ReplCommand::History);
        assert_eq!(parse_line("/frobnicate x"), ReplCommand::Unknown("frobnicate"));
    }
}
