//! Construction of embedders and answer generators from CLI options.

use std::sync::Arc;

use anyhow::{Context, bail};
use docent_model::{AnswerGenerator, MockGenerator};
use docent_rag::hashing::DEFAULT_HASHING_DIMENSIONS;
use docent_rag::{EmbedderInfo, EmbeddingProvider, HashingEmbeddingProvider};

use crate::cli::{EmbedderKind, ModelArgs, ProviderKind};

/// Embedder used to build a new index.
pub fn index_embedder(
    kind: EmbedderKind,
    dimensions: Option<usize>,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match kind {
        EmbedderKind::Hashing => Ok(Arc::new(HashingEmbeddingProvider::new(
            dimensions.unwrap_or(DEFAULT_HASHING_DIMENSIONS),
        )?)),
        EmbedderKind::Openai => openai_embedder(None, dimensions),
    }
}

/// Recreate the embedder an index was built with from its recorded identity.
pub fn embedder_for(info: &EmbedderInfo) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    if let Some(provider) = HashingEmbeddingProvider::from_model_id(&info.model_id) {
        return Ok(Arc::new(provider));
    }
    if let Some((model, dimensions)) =
        info.model_id.strip_prefix("openai/").and_then(|rest| rest.rsplit_once('/'))
    {
        let dimensions: usize = dimensions
            .parse()
            .with_context(|| format!("malformed embedder id '{}'", info.model_id))?;
        return openai_embedder(Some(model), Some(dimensions));
    }
    bail!("index was built with unsupported embedder '{}'", info.model_id)
}

#[cfg(feature = "openai")]
fn openai_embedder(
    model: Option<&str>,
    dimensions: Option<usize>,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let mut provider = docent_rag::OpenAIEmbeddingProvider::from_env()?;
    if let Some(model) = model {
        provider = provider.with_model(model);
    }
    if let Some(dimensions) = dimensions.filter(|d| *d != provider.dimensions()) {
        provider = provider.with_dimensions(dimensions);
    }
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "openai"))]
fn openai_embedder(
    _model: Option<&str>,
    _dimensions: Option<usize>,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    bail!("docent was built without the `openai` feature")
}

/// Answer generator selected by `args`.
pub fn generator(args: &ModelArgs) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
    match args.provider {
        ProviderKind::Mock => Ok(Arc::new(MockGenerator::new("mock"))),
        ProviderKind::Groq | ProviderKind::Openai => remote_generator(args),
    }
}

#[cfg(feature = "openai")]
fn remote_generator(args: &ModelArgs) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
    use docent_model::openai::{
        GROQ_BASE_URL, GROQ_DEFAULT_MODEL, OPENAI_BASE_URL, OpenAICompatibleGenerator,
    };

    let (key_var, default_model, default_base_url) = match args.provider {
        ProviderKind::Groq => ("GROQ_API_KEY", GROQ_DEFAULT_MODEL, GROQ_BASE_URL),
        _ => ("OPENAI_API_KEY", "gpt-4o-mini", OPENAI_BASE_URL),
    };
    let api_key = match &args.api_key {
        Some(key) => key.clone(),
        None => std::env::var(key_var)
            .with_context(|| format!("{key_var} is not set; pass --api-key or add it to .env"))?,
    };

    let generator =
        OpenAICompatibleGenerator::new(api_key, args.model.as_deref().unwrap_or(default_model))?
            .with_base_url(args.base_url.as_deref().unwrap_or(default_base_url));
    Ok(Arc::new(generator))
}

#[cfg(not(feature = "openai"))]
fn remote_generator(_args: &ModelArgs) -> anyhow::Result<Arc<dyn AnswerGenerator>> {
    bail!("docent was built without the `openai` feature; use --provider mock")
}
