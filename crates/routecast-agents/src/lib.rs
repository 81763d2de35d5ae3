//! Retrieval agents (§4.G): per-kind search -> rank -> fetch pipelines that
//! run concurrently against one route step. The generic machinery lives in
//! `pipeline`/`query`/`rank`/`retry`; `specializations` wires it to video,
//! song and knowledge content sources.

mod pipeline;
mod query;
mod rank;
mod retry;
mod specializations;

pub use pipeline::{Agent, AgentConfig, Fetch, RetrievalAgent, Search};
pub use query::{extract_queries, heuristic_queries, render_prompt};
pub use rank::{query_terms, rank, score, VideoDurationBounds};
pub use retry::{call_with_resilience, BackoffPolicy};
pub use specializations::{HttpFetchEndpoint, HttpSearchEndpoint, MockFetch, MockSearch};
