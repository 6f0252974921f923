mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::adapters::config::Settings;
use crate::core::error::{ChatError, NetworkError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}

#[derive(Parser, Debug)]
#[command(name = "wikichat", about = "Ask questions about Wikipedia articles")]
struct Cli {
    /// SQLite file holding chat histories.
    #[arg(long, env = "WIKICHAT_DB_PATH")]
    db: Option<String>,

    /// Answer endpoint receiving `{article, question}`.
    #[arg(long, env = "WIKICHAT_API_BASE")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search Wikipedia article titles.
    Search { term: Vec<String> },
    /// Start a chat about an article.
    New { title: String, url: String },
    /// List chat histories, newest first.
    List,
    /// Print one chat in chronological order.
    Show { chat_id: String },
    /// Ask a question in an existing chat.
    Ask {
        chat_id: String,
        question: Vec<String>,
    },
    /// Replace the text of a stored message.
    EditMessage { message_id: String, text: Vec<String> },
    DeleteMessage { message_id: String },
    /// Delete a chat and its messages.
    Delete { chat_id: String },
    /// Drop every chat and message.
    Nuke {
        #[arg(long)]
        yes: bool,
    },
    /// Interactive session (default).
    Chat,
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::load_global();
        if let Some(db) = self.db.as_deref().filter(|v| !v.trim().is_empty()) {
            settings.db_path = Some(db.trim().to_string());
        }
        if let Some(endpoint) = self.endpoint.as_deref().filter(|v| !v.trim().is_empty()) {
            settings.answer_endpoint = endpoint.trim().to_string();
        }
        settings
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let settings = cli.settings();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to start runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(cli.command.unwrap_or(Command::Chat), settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{error}");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command, settings: Settings) -> Result<(), CliError> {
    match command {
        Command::Search { term } => commands::search::search(&settings, &term.join(" ")).await,
        Command::New { title, url } => commands::history::new_chat(&settings, &title, &url).await,
        Command::List => commands::history::list(&settings).await,
        Command::Show { chat_id } => commands::history::show(&settings, &chat_id).await,
        Command::Ask { chat_id, question } => {
            commands::chat::ask(&settings, &chat_id, &question.join(" ")).await
        }
        Command::EditMessage { message_id, text } => {
            commands::messages::edit(&settings, &message_id, &text.join(" ")).await
        }
        Command::DeleteMessage { message_id } => {
            commands::messages::delete(&settings, &message_id).await
        }
        Command::Delete { chat_id } => commands::history::delete(&settings, &chat_id).await,
        Command::Nuke { yes } => commands::history::nuke(&settings, yes).await,
        Command::Chat => commands::chat::interactive(&settings).await,
    }
}
