//! Talk to a Code Chatter backend from the terminal.
//!
//! Reads the backend address from `--base-url` or the `CODE_CHATTER_URL`
//! environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Stream an answer about the processed codebase
//! chatter ask "How is the code organized?"
//!
//! # Complete answer with source citations
//! chatter ask --sync "What are the key dependencies?"
//!
//! # Queue a repository for ingestion, then poll it
//! chatter process-repo https://github.com/example/project
//! chatter task <task-id>
//!
//! # Interactive conversation
//! chatter chat
//! ```

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chatter_client::chat::ChatStore;
use chatter_client::{ApiClient, ClientConfig, FormFile};

/// Talk to a Code Chatter backend from the terminal.
#[derive(Parser)]
#[command(name = "chatter", version)]
struct Cli {
    /// Base URL of the backend (falls back to CODE_CHATTER_URL, then
    /// http://localhost:8000)
    #[arg(long)]
    base_url: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries after the first failed attempt
    #[arg(long)]
    retries: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question about the processed codebase (streams the answer)
    Ask {
        question: String,
        /// Wait for the complete answer with sources instead of streaming
        #[arg(long)]
        sync: bool,
    },
    /// General-purpose assistant chat
    Chatbot {
        question: String,
        /// Wait for the complete response instead of streaming
        #[arg(long)]
        sync: bool,
    },
    /// Interactive conversation (empty line to exit)
    Chat,
    /// Print suggested questions for the current knowledge base
    Suggest,
    /// Backend health summary
    Health,
    /// Vector database status
    Status,
    /// Queue a Git repository for processing
    ProcessRepo { url: String },
    /// Upload files for processing
    ProcessFiles { paths: Vec<PathBuf> },
    /// Show one background task, or all tasks when no id is given
    Task { id: Option<String> },
    /// Drop the knowledge base
    ResetDatabase,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.base_url {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env(),
    };
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
    }
    if let Some(retries) = cli.retries {
        config.max_retries = retries;
    }

    let client = match ApiClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&client, cli.command).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run(client: &ApiClient, command: Command) -> Result<(), String> {
    match command {
        Command::Ask { question, sync } => {
            if sync {
                let answer = client.ask_sync(&question).await.map_err(|e| e.to_string())?;
                println!("{}", answer.answer);
                if !answer.sources.is_empty() {
                    println!("\nSources:");
                    for source in &answer.sources {
                        println!("- {}", source.content.trim());
                    }
                }
            } else {
                stream_to_stdout(client, &question, false).await?;
            }
        }
        Command::Chatbot { question, sync } => {
            if sync {
                let response = client
                    .chatbot_sync(&question)
                    .await
                    .map_err(|e| e.to_string())?;
                println!("{response}");
            } else {
                stream_to_stdout(client, &question, true).await?;
            }
        }
        Command::Chat => chat_loop(client).await?,
        Command::Suggest => {
            for question in client
                .suggested_questions()
                .await
                .map_err(|e| e.to_string())?
            {
                println!("- {question}");
            }
        }
        Command::Health => {
            let health = client.health().await.map_err(|e| e.to_string())?;
            println!("status:   {}", health.status);
            println!("version:  {}", health.version);
            println!("database: {}", health.database_status);
            println!("uptime:   {:.0}s", health.uptime_seconds);
        }
        Command::Status => {
            let status = client.database_status().await.map_err(|e| e.to_string())?;
            println!("status:    {}", status.status);
            println!("message:   {}", status.message);
            println!("documents: {}", status.document_count);
        }
        Command::ProcessRepo { url } => {
            let accepted = client.process_repo(&url).await.map_err(|e| e.to_string())?;
            println!("{}", accepted.message);
            println!("task: {}", accepted.task_id);
        }
        Command::ProcessFiles { paths } => {
            if paths.is_empty() {
                return Err("no files given".into());
            }
            let mut files = Vec::new();
            for path in &paths {
                let bytes = std::fs::read(path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string());
                files.push(FormFile::new("files", filename, bytes));
            }
            let accepted = client
                .process_files(files)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", accepted.message);
            println!("task: {}", accepted.task_id);
        }
        Command::Task { id: Some(id) } => {
            let task = client.task(&id).await.map_err(|e| e.to_string())?;
            println!("{} [{:?}] {:.0}%", task.name, task.status, task.progress);
            if let Some(error) = &task.error_message {
                println!("error: {error}");
            }
        }
        Command::Task { id: None } => {
            let tasks = client.tasks().await.map_err(|e| e.to_string())?;
            for (id, task) in &tasks {
                println!("{id}  {} [{:?}] {:.0}%", task.name, task.status, task.progress);
            }
        }
        Command::ResetDatabase => {
            let message = client.reset_database().await.map_err(|e| e.to_string())?;
            println!("{message}");
        }
    }
    Ok(())
}

/// Stream one answer to stdout, flushing per fragment.
async fn stream_to_stdout(client: &ApiClient, question: &str, chatbot: bool) -> Result<(), String> {
    let mut stdout = io::stdout();
    let sink = |fragment: &str| {
        print!("{fragment}");
        let _ = stdout.flush();
    };
    let result = if chatbot {
        client.chatbot(question, sink).await
    } else {
        client.ask(question, sink).await
    };
    result.map_err(|e| e.to_string())?;
    println!();
    Ok(())
}

/// Interactive loop: each turn streams into a [`ChatStore`] message, and a
/// failed send renders the error as the message content instead of
/// aborting the session.
async fn chat_loop(client: &ApiClient) -> Result<(), String> {
    let store = ChatStore::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        if stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| e.to_string())?
            == 0
        {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        store.push_user(question);
        store.set_processing(true);
        let id = store.begin_assistant();

        let result = client
            .ask(question, |fragment| {
                store.push_delta(&id, fragment);
                print!("{fragment}");
                let _ = stdout.flush();
            })
            .await;

        match result {
            Ok(()) => {
                store.finalize(&id);
                println!();
            }
            Err(e) => {
                // Render the failure as the answer, like the web UI does.
                let message = format!("Sorry, something went wrong: {e}");
                store.fail(&id, &message);
                println!("{message}");
            }
        }
        store.set_processing(false);
    }

    Ok(())
}
