use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use travlog_application::ChatService;
use travlog_core::graph::Graph;
use travlog_core::session::SessionManager;
use travlog_infrastructure::retrieval::{
    Bm25Retriever, DEFAULT_WEIGHTS, DenseRetriever, EnsembleRetriever, HttpEmbedder,
};
use travlog_infrastructure::{JsonHistoryRepository, load_corpus};
use travlog_interaction::LlamaInference;

#[derive(Parser)]
#[command(name = "travlog")]
#[command(about = "Travlog - conversational assistant for travel card products", long_about = None)]
struct Cli {
    /// Path to the JSON document corpus.
    #[arg(long, default_value = "data/corpus.json")]
    corpus: PathBuf,

    /// Directory for per-session chat history files.
    #[arg(long, default_value = "history")]
    history_dir: PathBuf,

    /// Directory for daily-rolling log files.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session.
    Chat,
    /// Ask a single question and print the answer.
    Ask {
        /// The question to ask.
        question: String,
        /// Reuse an existing session id.
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_tracing(&cli.log_dir)?;

    let service = build_service(&cli).await?;

    match cli.command {
        Commands::Chat => chat_repl(&service).await,
        Commands::Ask { question, session } => {
            let reply = service.send(session.as_deref(), &question).await?;
            println!("{}", reply.answer);
            Ok(())
        }
    }
}

fn init_tracing(log_dir: &PathBuf) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "travlog.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .try_init()
        .context("failed to initialize tracing")?;
    Ok(guard)
}

async fn build_service(cli: &Cli) -> Result<ChatService> {
    let corpus = load_corpus(&cli.corpus)
        .await
        .with_context(|| format!("failed to load corpus from {}", cli.corpus.display()))?;

    let embedder = Arc::new(HttpEmbedder::try_from_env()?);
    let dense = DenseRetriever::index(embedder, corpus.clone())
        .await
        .context("failed to build the dense index")?;
    let lexical = Bm25Retriever::new(corpus);
    let [dense_weight, lexical_weight] = DEFAULT_WEIGHTS;
    let retriever = EnsembleRetriever::new(vec![
        (Arc::new(dense), dense_weight),
        (Arc::new(lexical), lexical_weight),
    ]);

    let inference = LlamaInference::try_from_env()?;
    let graph = Arc::new(Graph::new(Arc::new(inference), Arc::new(retriever)));
    let sessions = Arc::new(SessionManager::new());
    let history = Arc::new(JsonHistoryRepository::new(cli.history_dir.clone()));

    info!("service wired, corpus indexed");
    Ok(ChatService::new(sessions, graph, history))
}

async fn chat_repl(service: &ChatService) -> Result<()> {
    println!("travlog chat (exit 또는 quit 입력 시 종료)");
    println!("무엇을 도와드릴까요?");

    let stdin = std::io::stdin();
    let mut session_id: Option<String> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        let reply = service.send(session_id.as_deref(), question).await?;
        session_id = Some(reply.session_id.clone());
        if reply.cancelled {
            println!("(중단되었습니다)");
        } else {
            println!("{}", reply.answer);
        }
    }

    Ok(())
}
