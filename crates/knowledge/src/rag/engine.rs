//! Query orchestration.
//!
//! classify → (embed → retrieve → assemble) → prompt → generate → payload.
//! The engine holds no mutable state; share it behind an `Arc` and run as
//! many queries concurrently as the backends allow.

use crate::assembler::{assemble, AssembledContext};
use crate::chunker::Chunker;
use crate::classifier::{self, QueryMode};
use crate::embeddings::{create_provider, Embedder, EmbeddingProvider};
use crate::parser::{DocumentParser, TextParser};
use crate::rag::types::{AnswerPayload, EngineStats, QueryState, SummaryStyle, Turn};
use crate::retriever::{Retrieval, Retriever};
use crate::vector_index::{create_index, MetadataFilter, VectorIndex};
use edith_core::{retry, with_timeout, AppConfig, AppError, AppResult, RetryPolicy};
use edith_llm::{create_client, LlmClient, LlmRequest};
use edith_prompt::{ids, BuiltPrompt, HistoryTurn, PromptInput, PromptLibrary};
use std::sync::Arc;

/// Reply to a summary request when the index holds nothing.
pub const NO_NOTES_MESSAGE: &str = "No notes found to summarize.";

/// Backends an engine is assembled from.
pub struct EngineComponents {
    pub embedding_provider: Arc<dyn EmbeddingProvider>,
    pub index: Arc<dyn VectorIndex>,
    pub llm: Arc<dyn LlmClient>,
    pub parser: Arc<dyn DocumentParser>,
}

impl EngineComponents {
    /// Resolve every backend named in the configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedding_provider = create_provider(&config.embedding)?;
        let index = create_index(config, embedding_provider.model_name())?;
        let api_key = config.resolve_api_key();
        let llm = create_client(
            &config.llm.provider,
            config.llm.endpoint.as_deref(),
            api_key.as_deref(),
        )?;

        Ok(Self {
            embedding_provider,
            index,
            llm,
            parser: Arc::new(TextParser::new()),
        })
    }
}

/// The RAG engine: ingestion, answering, summaries and index maintenance.
pub struct RagEngine {
    pub(crate) config: AppConfig,
    pub(crate) embedder: Embedder,
    pub(crate) index: Arc<dyn VectorIndex>,
    pub(crate) retriever: Retriever,
    pub(crate) chunker: Chunker,
    pub(crate) parser: Arc<dyn DocumentParser>,
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) prompts: PromptLibrary,
    pub(crate) policy: RetryPolicy,
}

impl RagEngine {
    /// Build an engine with the backends selected in `config`.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let components = EngineComponents::from_config(config)?;
        Self::new(config.clone(), components)
    }

    /// Build an engine from explicit backends.
    ///
    /// Fails with a configuration error when the embedder and the index
    /// disagree on dimension, or when a prompt override is broken.
    pub fn new(config: AppConfig, components: EngineComponents) -> AppResult<Self> {
        let embedder = Embedder::from_settings(
            components.embedding_provider,
            &config.embedding,
            &config.resilience,
        )?;

        if components.index.dimension() != embedder.dimensions() {
            return Err(AppError::Config(format!(
                "Index '{}' stores {}-dimensional vectors but the embedder produces {}",
                config.index.namespace,
                components.index.dimension(),
                embedder.dimensions()
            )));
        }

        let chunker = Chunker::from_settings(&config.chunking)?;
        let prompts = PromptLibrary::load(&config.workspace)?;
        let policy = RetryPolicy::from_settings(&config.resilience);
        let retriever = Retriever::new(
            embedder.clone(),
            components.index.clone(),
            config.resilience.index_timeout(),
            policy,
        );

        tracing::info!(
            llm = components.llm.provider_name(),
            embedding = embedder.provider_name(),
            index = components.index.backend_name(),
            namespace = %config.index.namespace,
            "RAG engine ready"
        );

        Ok(Self {
            config,
            embedder,
            index: components.index,
            retriever,
            chunker,
            parser: components.parser,
            llm: components.llm,
            prompts,
            policy,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Answer a message using the whole index.
    pub async fn query(&self, text: &str, history: &[Turn]) -> AppResult<AnswerPayload> {
        self.query_filtered(text, history, None).await
    }

    /// Answer a message, restricting retrieval to entries matching `filter`.
    pub async fn query_filtered(
        &self,
        text: &str,
        history: &[Turn],
        filter: Option<&MetadataFilter>,
    ) -> AppResult<AnswerPayload> {
        let mut trace = Trace::default();
        trace.enter(QueryState::Received);

        let classification = classifier::explain(text);
        trace.enter(QueryState::Classified);

        match self
            .answer(text, history, filter, classification.mode, &mut trace)
            .await
        {
            Ok(payload) => Ok(payload),
            Err(err) => {
                trace.enter(QueryState::Failed);
                tracing::warn!(
                    mode = classification.mode.as_str(),
                    kind = %err.kind(),
                    error = %err,
                    "Query failed"
                );
                Err(err)
            }
        }
    }

    async fn answer(
        &self,
        text: &str,
        history: &[Turn],
        filter: Option<&MetadataFilter>,
        mode: QueryMode,
        trace: &mut Trace,
    ) -> AppResult<AnswerPayload> {
        let settings = &self.config.retrieval;

        let (retrieval, context) = if mode == QueryMode::Casual {
            trace.enter(QueryState::Skipped);
            (Retrieval::default(), AssembledContext::default())
        } else {
            trace.enter(QueryState::Retrieving);
            let retrieval = self
                .retriever
                .retrieve(text, settings.top_k, settings.similarity_threshold, filter)
                .await?;
            trace.enter(QueryState::Retrieved);
            let context = assemble(&retrieval.results, settings.max_context_chars);
            (retrieval, context)
        };
        trace.enter(QueryState::ContextBuilt);

        let grounded = !context.is_empty();
        let prompt_id = match (mode, grounded) {
            (QueryMode::Casual, _) => ids::ANSWER_CASUAL,
            (_, false) => ids::ANSWER_UNGROUNDED,
            (QueryMode::Knowledge, true) => ids::ANSWER_KNOWLEDGE,
            (QueryMode::Hybrid, true) => ids::ANSWER_HYBRID,
        };

        let mut input = PromptInput::new(text).with_history(self.recent_history(history));
        if grounded {
            input = input.with_context(context.text.as_str());
        }
        let prompt = self.prompts.render(prompt_id, &input)?;

        let budgets = &self.config.llm.max_tokens;
        let max_tokens = match mode {
            QueryMode::Knowledge => budgets.knowledge,
            QueryMode::Hybrid => budgets.hybrid,
            QueryMode::Casual => budgets.casual,
        };

        trace.enter(QueryState::Generating);
        let answer = self.generate(prompt, max_tokens).await?;
        trace.enter(QueryState::Answered);

        // Only blocks that reached the prompt count; none means no confidence
        let confidence = context
            .sources
            .iter()
            .map(|source| source.score)
            .fold(0.0_f32, f32::max)
            .clamp(0.0, 1.0);

        tracing::info!(
            mode = mode.as_str(),
            prompt = prompt_id,
            retrieved = retrieval.results.len(),
            top_score = ?retrieval.top_score(),
            sources = context.sources.len(),
            dropped = context.dropped,
            confidence,
            "Answered query"
        );

        Ok(AnswerPayload {
            answer,
            mode,
            confidence,
            num_sources: context.sources.len(),
            sources: context.sources,
            grounded,
            query_truncated: retrieval.query_truncated,
            trace: trace.take(),
        })
    }

    /// Summarize the indexed notes in the given style.
    ///
    /// An empty index yields [`NO_NOTES_MESSAGE`] without calling the model.
    pub async fn summarize(&self, style: SummaryStyle) -> AppResult<String> {
        let settings = &self.config.retrieval;

        if self.stats().await?.fragments == 0 {
            tracing::info!("Summary requested on an empty index");
            return Ok(NO_NOTES_MESSAGE.to_string());
        }

        let retrieval = self.retriever.retrieve_broad(settings.summary_top_k).await?;
        let context = assemble(&retrieval.results, settings.summary_max_context_chars);
        if context.is_empty() {
            return Ok(NO_NOTES_MESSAGE.to_string());
        }

        let prompt = self.prompts.render(
            style.prompt_id(),
            &PromptInput::new("").with_context(context.text),
        )?;
        let summary = self
            .generate(prompt, self.config.llm.max_tokens.summary)
            .await?;

        tracing::info!(
            style = style.as_str(),
            sources = context.sources.len(),
            "Summarized notes"
        );
        Ok(summary)
    }

    /// Extract topics, key points, action items and a category from one note.
    pub async fn analyze(&self, note_text: &str) -> AppResult<String> {
        if note_text.trim().is_empty() {
            return Err(AppError::Parse("Nothing to analyze: the note is empty".to_string()));
        }

        let prompt = self.prompts.render(
            ids::NOTE_ANALYZE,
            &PromptInput::new("").with_context(note_text.trim()),
        )?;
        self.generate(prompt, self.config.llm.max_tokens.analyze)
            .await
    }

    pub async fn stats(&self) -> AppResult<EngineStats> {
        let timeout = self.config.resilience.index_timeout();
        let stats = retry(&self.policy, "index stats", || {
            with_timeout("index stats", timeout, self.index.stats())
        })
        .await?;

        Ok(EngineStats {
            fragments: stats.count,
            dimension: stats.dimension,
            fill_ratio: stats.fill_ratio,
            index_backend: self.index.backend_name().to_string(),
            namespace: self.config.index.namespace.clone(),
            embedding_provider: self.embedder.provider_name().to_string(),
            embedding_model: self.embedder.model_name().to_string(),
            llm_provider: self.llm.provider_name().to_string(),
            llm_model: self.config.llm.model.clone(),
        })
    }

    /// Remove every fragment of one document.
    pub async fn delete_document(&self, document_id: &str) -> AppResult<usize> {
        self.delete(&MetadataFilter::document(document_id)).await
    }

    /// Remove every fragment matching `filter`.
    pub async fn delete(&self, filter: &MetadataFilter) -> AppResult<usize> {
        let timeout = self.config.resilience.index_timeout();
        let removed = retry(&self.policy, "index delete", || {
            with_timeout("index delete", timeout, self.index.delete(filter))
        })
        .await?;

        tracing::info!(removed, filter = ?filter, "Deleted fragments");
        Ok(removed)
    }

    /// Empty the index.
    pub async fn clear(&self) -> AppResult<usize> {
        self.delete(&MetadataFilter::all()).await
    }

    async fn generate(&self, prompt: BuiltPrompt, max_tokens: u32) -> AppResult<String> {
        let mut request = LlmRequest::new(prompt.user, &self.config.llm.model)
            .with_max_tokens(max_tokens)
            .with_temperature(self.config.llm.temperature);
        if let Some(system) = prompt.system {
            request = request.with_system(system);
        }

        let timeout = self.config.resilience.generate_timeout();
        let response = retry(&self.policy, "generation", || {
            with_timeout("generation", timeout, self.llm.complete(&request))
        })
        .await?;

        Ok(response.content.trim().to_string())
    }

    fn recent_history(&self, history: &[Turn]) -> Vec<HistoryTurn> {
        let keep = self.config.retrieval.max_history_turns;
        let skip = history.len().saturating_sub(keep);
        history[skip..].iter().map(HistoryTurn::from).collect()
    }
}

/// State transitions of one query, logged as they happen.
#[derive(Default)]
struct Trace {
    states: Vec<QueryState>,
}

impl Trace {
    fn enter(&mut self, state: QueryState) {
        tracing::debug!(state = ?state, "Query state");
        self.states.push(state);
    }

    fn take(&mut self) -> Vec<QueryState> {
        std::mem::take(&mut self.states)
    }
}
