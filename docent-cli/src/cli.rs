//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use docent_chat::CondenseMode;
use docent_rag::{DocumentSplit, Metric};

/// docent: ask questions about your documents
#[derive(Parser, Debug)]
#[command(name = "docent", version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true, env = "DOCENT_LOG_FORMAT")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an index from a text file or a directory of .txt/.md files
    Index(IndexArgs),
    /// Answer a single question
    Ask(AskArgs),
    /// Start an interactive conversation
    Chat(ChatArgs),
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Text file or directory to index
    pub corpus: PathBuf,

    /// Where to write the index
    #[arg(short, long, default_value = "docent.index.json", env = "DOCENT_INDEX")]
    pub output: PathBuf,

    /// How source text is split into documents: sentence, paragraph or whole
    #[arg(long, default_value_t = DocumentSplit::Sentence)]
    pub split: DocumentSplit,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = 4096)]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    #[arg(long, default_value_t = 100)]
    pub chunk_overlap: usize,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Hashing)]
    pub embedder: EmbedderKind,

    /// Embedding dimensions (backend default if omitted)
    #[arg(long)]
    pub dimensions: Option<usize>,

    /// Similarity metric stored with the index
    #[arg(long, value_enum, default_value_t = MetricArg::Cosine)]
    pub metric: MetricArg,
}

/// Options shared by `ask` and `chat`.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Index file written by `docent index`
    #[arg(short, long, default_value = "docent.index.json", env = "DOCENT_INDEX")]
    pub index: PathBuf,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long, default_value_t = 4)]
    pub top_k: usize,

    /// Drop chunks scoring below this value
    #[arg(long)]
    pub similarity_threshold: Option<f32>,

    /// Upper bound on generated tokens per answer
    #[arg(long, default_value_t = 512)]
    pub max_tokens: usize,

    /// Seconds to wait for the model before giving up
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Print answers as they are generated
    #[arg(long)]
    pub stream: bool,

    /// List the chunks each answer was based on
    #[arg(long)]
    pub sources: bool,

    #[command(flatten)]
    pub model: ModelArgs,
}

/// Answer generator selection.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Answer generator backend
    #[arg(long, value_enum, default_value_t = ProviderKind::Groq, env = "DOCENT_PROVIDER")]
    pub provider: ProviderKind,

    /// Model name (provider default if omitted)
    #[arg(long, env = "DOCENT_MODEL")]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "DOCENT_BASE_URL")]
    pub base_url: Option<String>,

    /// API key (falls back to GROQ_API_KEY or OPENAI_API_KEY)
    #[arg(long, env = "DOCENT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// The question
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Keep at most this many turns of history
    #[arg(long)]
    pub max_history_turns: Option<usize>,

    /// How follow-up questions become retrieval queries
    #[arg(long, value_enum, default_value_t = CondenseArg::Concat)]
    pub condense: CondenseArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbedderKind {
    /// Offline feature hashing
    Hashing,
    /// OpenAI embeddings API (needs OPENAI_API_KEY)
    Openai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// Groq chat completions (llama-3.3-70b-versatile)
    Groq,
    /// OpenAI chat completions
    Openai,
    /// Offline stand-in that always answers "I don't know."
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    Cosine,
    Euclidean,
}

impl From<MetricArg> for Metric {
    fn from(metric: MetricArg) -> Self {
        match metric {
            MetricArg::Cosine => Metric::Cosine,
            MetricArg::Euclidean => Metric::Euclidean,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CondenseArg {
    /// Join recent questions with the follow-up
    Concat,
    /// Ask the model to rephrase the follow-up
    Llm,
}

impl From<CondenseArg> for CondenseMode {
    fn from(mode: CondenseArg) -> Self {
        match mode {
            CondenseArg::Concat => CondenseMode::HistoryConcat,
            CondenseArg::Llm => CondenseMode::Llm,
        }
    }
}
