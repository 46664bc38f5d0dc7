// Query module
// Retrieval-augmented answering: embed, retrieve, assemble, prompt, generate

pub mod context;
pub mod prompt;


use itertools::Itertools;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::config::settings::{DEFAULT_MAX_SECTION_LEN, DEFAULT_TOP_K};
use crate::database::{Match, VectorIndex};
use crate::embeddings::{Embedder, Embedding};
use crate::generation::Generator;
use crate::{RagError, Result, run_blocking};

pub use context::construct_context;
pub use prompt::{PromptTemplate, build};

/// Progress of a single query through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Received,
    Embedded,
    Retrieved,
    Assembled,
    Generated,
    Done,
    Failed,
}

impl QueryStage {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for QueryStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Embedded => "embedded",
            Self::Retrieved => "retrieved",
            Self::Assembled => "assembled",
            Self::Generated => "generated",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything produced while answering one question
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub context: String,
    pub prompt: String,
    pub matches: Vec<Match>,
}

/// Tracks the stage of one query and logs every transition
struct StageTracker {
    stage: QueryStage,
}

impl StageTracker {
    fn new() -> Self {
        debug!("Query stage: {}", QueryStage::Received);
        Self {
            stage: QueryStage::Received,
        }
    }

    fn advance(&mut self, next: QueryStage) {
        debug!("Query stage: {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail<T>(&mut self, error: RagError) -> Result<T> {
        warn!("Query failed after stage {}: {}", self.stage, error);
        self.stage = QueryStage::Failed;
        Err(error)
    }
}

/// Orchestrates embedder, vector index and generator for single queries.
///
/// No call is retried here; each external call succeeds once or the whole
/// query fails. Embedder and generator calls run on tokio's blocking pool,
/// so the engine needs a tokio runtime but not a multi-threaded one. The
/// engine holds no mutable state, so clones can serve concurrent queries.
#[derive(Clone)]
pub struct RagQueryEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    max_section_len: usize,
    template: PromptTemplate,
}

impl RagQueryEngine {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            top_k: DEFAULT_TOP_K,
            max_section_len: DEFAULT_MAX_SECTION_LEN,
            template: PromptTemplate::default(),
        }
    }

    /// Apply `top_k`, `max_section_len` and the prompt template from configuration
    #[inline]
    pub fn with_retrieval_config(self, config: &RetrievalConfig) -> Result<Self> {
        Ok(self
            .with_top_k(config.top_k)
            .with_max_section_len(config.max_section_len)
            .with_template(PromptTemplate::new(&config.prompt_template)?))
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_max_section_len(mut self, max_section_len: usize) -> Self {
        self.max_section_len = max_section_len;
        self
    }

    #[inline]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` and return only the generated text
    #[inline]
    pub async fn rag_query(&self, question: &str) -> Result<String> {
        Ok(self.answer(question).await?.answer)
    }

    /// Answer `question`, keeping the intermediate context, prompt and matches
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        let mut tracker = StageTracker::new();

        let vector = match embed_question(Arc::clone(&self.embedder), question).await {
            Ok(vector) => vector,
            Err(e) => return tracker.fail(e),
        };
        tracker.advance(QueryStage::Embedded);

        let matches = match self.index.query(&vector, self.top_k).await {
            Ok(matches) => matches,
            Err(e) => return tracker.fail(e),
        };
        debug!("Retrieved {} matches", matches.len());
        tracker.advance(QueryStage::Retrieved);

        let passages = passages(&matches);
        let context = construct_context(&passages, self.max_section_len);
        if context.is_empty() && !passages.is_empty() {
            warn!(
                "No passage fits within {} characters, context is empty",
                self.max_section_len
            );
        }
        tracker.advance(QueryStage::Assembled);

        let prompt = self.template.render(&context, question);
        let generator = Arc::clone(&self.generator);
        let request = prompt.clone();
        let answer = match run_blocking(move || generator.generate(&request)).await {
            Ok(answer) => answer,
            Err(e) => return tracker.fail(e),
        };
        tracker.advance(QueryStage::Generated);

        tracker.advance(QueryStage::Done);
        info!(
            "Answered query using {} matches ({} context characters)",
            matches.len(),
            context.chars().count()
        );

        Ok(RagAnswer {
            answer,
            context,
            prompt,
            matches,
        })
    }
}

async fn embed_question(embedder: Arc<dyn Embedder>, question: &str) -> Result<Embedding> {
    let question = question.to_string();
    run_blocking(move || embedder.embed(&question)).await
}

/// Embed `question` and return the nearest matches without generating
#[inline]
pub async fn retrieve(
    embedder: Arc<dyn Embedder>,
    index: &dyn VectorIndex,
    question: &str,
    top_k: usize,
) -> Result<Vec<Match>> {
    let vector = embed_question(embedder, question).await?;
    index.query(&vector, top_k).await
}

/// Passage texts of the matches, in rank order. Matches without text are skipped.
#[inline]
pub fn passages(matches: &[Match]) -> Vec<&str> {
    matches
        .iter()
        .filter_map(|m| {
            let text = m.text();
            if text.is_none() {
                debug!("Match '{}' has no text, skipping", m.id);
            }
            text
        })
        .collect()
}

/// One line per match: `Match N: ID = <id>, Score = <score>, Snippet: <text>`
#[inline]
pub fn format_matches(matches: &[Match]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "Match {}: ID = {}, Score = {:.6}, Snippet: {}",
                i + 1,
                m.id,
                m.score,
                m.text().unwrap_or("")
            )
        })
        .join("\n")
}
