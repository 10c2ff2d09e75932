use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use pdf_chat_core::config::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL_NAME,
    DEFAULT_TOP_K,
};
use pdf_chat_core::services::openai::{DEFAULT_OPENAI_BASE_URL, OPENAI_EMBEDDING_DIMENSIONS};
use pdf_chat_core::{
    ingest_documents, load_source_documents, Answer, CharacterNgramEmbedder, ChatError,
    EmbeddingService, LopdfExtractor, OpenAiChatModel, OpenAiEmbedder, OpenAiSettings,
    RagConfig, RagPipeline, RetryPolicy, Session, SessionBuild,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load PDFs and chat about them interactively.
    Chat {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Print the retrieved passages under each answer.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Load PDFs and answer the given questions in order, as one conversation.
    Ask {
        #[command(flatten)]
        pipeline: PipelineArgs,
        /// Question to ask; repeat for follow-ups.
        #[arg(long = "question", short = 'q', required = true)]
        questions: Vec<String>,
        /// Print the retrieved passages under each answer.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Extract and chunk PDFs without calling any service.
    Inspect {
        /// PDF files or folders searched recursively.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        chunk_overlap: usize,
    },
}

#[derive(Args)]
struct PipelineArgs {
    /// PDF files or folders searched recursively.
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Maximum characters per chunk.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks of a page.
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Passages retrieved per question.
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Chat model used to answer.
    #[arg(long, env = "PDF_CHAT_MODEL", default_value = DEFAULT_MODEL_NAME)]
    model: String,

    /// Embedding model used for chunks and questions.
    #[arg(long, env = "PDF_CHAT_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Embedding vector size requested from the service.
    #[arg(long, default_value_t = OPENAI_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Chunks sent per embedding request.
    #[arg(long, default_value_t = 64)]
    embedding_batch_size: usize,

    /// Embed locally with hashed character trigrams instead of the embedding service.
    #[arg(long, default_value_t = false)]
    local_embeddings: bool,

    /// Retries for rate-limited or unavailable service calls.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// OpenAI-compatible API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,
}

impl PipelineArgs {
    fn rag_config(&self) -> RagConfig {
        RagConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            model_name: self.model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_batch_size: self.embedding_batch_size,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
            ..RagConfig::default()
        }
    }

    fn pipeline(&self) -> anyhow::Result<RagPipeline> {
        let config = self.rag_config();
        let api_key = self
            .openai_api_key
            .clone()
            .context("an API key is required: pass --openai-api-key or set OPENAI_API_KEY")?;

        let mut settings = OpenAiSettings::new(api_key);
        settings.base_url = self.openai_base_url.clone();
        settings.timeout = Duration::from_secs(self.timeout_secs);

        let embedder: Arc<dyn EmbeddingService> = if self.local_embeddings {
            Arc::new(CharacterNgramEmbedder::default())
        } else {
            Arc::new(OpenAiEmbedder::new(
                &settings,
                &config.embedding_model,
                self.embedding_dimensions,
            )?)
        };
        let model = Arc::new(OpenAiChatModel::new(&settings, &config.model_name)?);

        Ok(RagPipeline::new(
            config,
            Arc::new(LopdfExtractor),
            embedder,
            model,
        )?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-chat boot"
    );

    match cli.command {
        Command::Inspect {
            paths,
            chunk_size,
            chunk_overlap,
        } => {
            let config = RagConfig {
                chunk_size,
                chunk_overlap,
                ..RagConfig::default()
            };
            let chunking = config.chunking()?;
            let documents = load_source_documents(&paths)?;
            let report = ingest_documents(&documents, &LopdfExtractor, &chunking)?;

            for document in &documents {
                let chunks = report
                    .chunks
                    .iter()
                    .filter(|chunk| chunk.source == document.name)
                    .count();
                let pages = report
                    .chunks
                    .iter()
                    .filter(|chunk| chunk.source == document.name)
                    .map(|chunk| chunk.page)
                    .collect::<std::collections::BTreeSet<_>>()
                    .len();
                println!("{}: {chunks} chunks from {pages} page(s)", document.name);
            }
            for skipped in &report.skipped {
                println!("{}: skipped ({})", skipped.name, skipped.error);
            }
        }
        Command::Ask {
            pipeline,
            questions,
            show_context,
        } => {
            let Some(mut session) = open_session(&pipeline).await? else {
                return Ok(());
            };
            for question in questions {
                println!("> {question}");
                let answer = session.answer(&question).await?;
                print_answer(&answer, show_context);
            }
        }
        Command::Chat {
            pipeline,
            show_context,
        } => {
            let Some(mut session) = open_session(&pipeline).await? else {
                return Ok(());
            };
            chat_loop(&mut session, show_context).await?;
        }
    }

    Ok(())
}

async fn open_session(args: &PipelineArgs) -> anyhow::Result<Option<Session>> {
    let pipeline = args.pipeline()?;
    let documents = load_source_documents(&args.paths)?;
    info!(documents = documents.len(), "processing documents");

    let SessionBuild {
        session,
        failed_documents,
        skipped,
    } = pipeline.build_session(&documents).await?;

    for skipped in &skipped {
        warn!(document = %skipped.name, reason = %skipped.error, "skipped pdf");
    }
    if !failed_documents.is_empty() {
        let names = failed_documents.into_iter().collect::<Vec<_>>().join(", ");
        println!("No text could be read from: {names}");
    }

    match session {
        Some(session) => {
            println!(
                "Ready: {} passages indexed from {} document(s).",
                session.indexed_chunks(),
                documents.len().saturating_sub(skipped.len())
            );
            Ok(Some(session))
        }
        None => {
            println!("Nothing to process: none of the documents contained readable text.");
            Ok(None)
        }
    }
}

async fn chat_loop(session: &mut Session, show_context: bool) -> anyhow::Result<()> {
    println!("Ask a question about your documents (:history to review, :quit to leave).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            ":quit" | ":q" | "exit" => break,
            ":history" => {
                for (number, turn) in session.history().iter().enumerate() {
                    println!("[{}] {} asked {}", number + 1, turn.asked_at.to_rfc3339(), turn.question);
                    println!("    {}", turn.answer);
                }
                continue;
            }
            _ => {}
        }

        match session.answer(question).await {
            Ok(answer) => print_answer(&answer, show_context),
            Err(ChatError::EmptyQuestion) => continue,
            Err(error) => eprintln!("error: {error}"),
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer, show_context: bool) {
    println!("{}", answer.text.trim());

    let citations = answer.citations();
    if !citations.is_empty() {
        println!("Sources:");
        for (number, citation) in citations.iter().enumerate() {
            println!("  {}. {citation}", number + 1);
        }
    }

    if show_context {
        for chunk in &answer.sources {
            println!("--- {}\n{}", chunk.citation(), chunk.text.trim());
        }
    }
    println!();
}
