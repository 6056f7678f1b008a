//! Natural-language and structured profile search.
//!
//! A free-text query is reduced to structured facets, answered by a vector
//! similarity search when an embedding provider is configured, and by a
//! two-tier keyword fallback otherwise. Whatever path produced the
//! candidates, the extracted facets are applied as a final filter.
//!
//! # Main types
//!
//! - [`Facets`]: Industry, role, grade, and education constraints extracted from text.
//! - [`EmbeddingProvider`]: Trait for turning query text into a vector.
//! - [`VectorRetriever`]: Similarity search over stored profile embeddings.
//! - [`KeywordFallback`]: Structured-then-substring fallback retrieval.
//! - [`NaturalSearch`]: The full natural-language pipeline.
//! - [`FilterSearch`]: Structured search driven by an explicit filter set.

/// Final filtering and capping of candidate lists.
pub mod compose;
/// Embedding provider trait and OpenAI-compatible client.
pub mod embedding;
/// Facet extraction from free text.
pub mod facets;
/// Two-tier keyword fallback retriever.
pub mod fallback;
/// Structured filter search.
pub mod filter;
/// Industry categories and their stored synonyms.
pub mod industry;
/// The natural-language search pipeline.
pub mod pipeline;
/// Vector similarity retriever.
pub mod vector;

pub use compose::compose;
pub use embedding::{EmbeddingProvider, OpenAiEmbedding};
pub use facets::{extract_facets, Facets};
pub use fallback::{merge_in_plan_order, KeywordFallback, SubQuery};
pub use filter::{FilterRequest, FilterSearch, OneOrMany};
pub use industry::Industry;
pub use pipeline::{NaturalSearch, SearchOutcome, SearchPolicy};
pub use vector::{Unavailable, VectorOutcome, VectorRetriever, VectorSource};
