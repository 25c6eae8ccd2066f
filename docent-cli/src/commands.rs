//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use docent_chat::{ChatConfig, ChatSession, CondenseMode};
use docent_rag::{IndexPipeline, RagConfig, Retriever, SharedIndex, VectorIndex, load_corpus};
use tracing::info;

use crate::cli::{AskArgs, ChatArgs, IndexArgs, SessionArgs};
use crate::{console, providers};

/// Build an index from a corpus and write it to disk.
pub async fn run_index(args: IndexArgs) -> anyhow::Result<()> {
    let documents = load_corpus(&args.corpus, args.split)
        .with_context(|| format!("failed to read corpus at {}", args.corpus.display()))?;
    if documents.is_empty() {
        bail!("no text found in {}", args.corpus.display());
    }

    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .metric(args.metric.into())
        .build()?;
    let pipeline = IndexPipeline::builder()
        .config(config)
        .embedding_provider(providers::index_embedder(args.embedder, args.dimensions)?)
        .build()?;

    let index = pipeline.build_index(&documents).await?;
    let chunk_count = index.len();
    SharedIndex::new(index).persist(&args.output).await?;

    info!(document_count = documents.len(), chunk_count, path = %args.output.display(), "index written");
    println!(
        "Indexed {} documents ({} chunks) into {}",
        documents.len(),
        chunk_count,
        args.output.display()
    );
    Ok(())
}

/// Answer one question and exit.
pub async fn run_ask(args: AskArgs) -> anyhow::Result<()> {
    let config = chat_config(&args.session, None, CondenseMode::HistoryConcat)?;
    let mut session = open_session(&args.session, config)?;
    let question = args.question.join(" ");

    let answer = console::ask(&mut session, &question, args.session.stream).await?;
    if args.session.sources {
        console::print_sources(&answer);
    }
    Ok(())
}

/// Run the interactive console.
pub async fn run_chat(args: ChatArgs) -> anyhow::Result<()> {
    let config = chat_config(&args.session, args.max_history_turns, args.condense.into())?;
    let mut session = open_session(&args.session, config)?;
    console::run_console(&mut session, args.session.stream, args.session.sources).await
}

fn chat_config(
    args: &SessionArgs,
    max_history_turns: Option<usize>,
    condense: CondenseMode,
) -> anyhow::Result<ChatConfig> {
    let mut builder = ChatConfig::builder()
        .top_k(args.top_k)
        .max_tokens(args.max_tokens)
        .generation_timeout(Duration::from_secs(args.timeout_secs))
        .condense(condense);
    if let Some(turns) = max_history_turns {
        builder = builder.max_history_turns(turns);
    }
    Ok(builder.build()?)
}

/// Load the index, recreate its embedder and wire up a chat session.
pub fn open_session(args: &SessionArgs, config: ChatConfig) -> anyhow::Result<ChatSession> {
    let index = VectorIndex::load(&args.index).with_context(|| {
        format!("could not open index {}; run `docent index` first", args.index.display())
    })?;
    let embedder = providers::embedder_for(index.embedder())?;

    let mut rag = RagConfig::builder().top_k(config.top_k);
    if let Some(threshold) = args.similarity_threshold {
        rag = rag.similarity_threshold(threshold);
    }
    let retriever = Retriever::from_index(index, embedder, &rag.build()?)?;
    info!(path = %args.index.display(), retriever = ?retriever, "index loaded");

    let session = ChatSession::builder()
        .retriever(Arc::new(retriever))
        .generator(providers::generator(&args.model)?)
        .config(config)
        .build()?;
    Ok(session)
}
