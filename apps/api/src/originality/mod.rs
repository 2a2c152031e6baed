// Code-originality assessment.
// Links → scoped clone → snippets → code search → similarity → judge → aggregation.
// All generative-model calls go through llm_client.

pub mod aggregator;
pub mod judge;
pub mod links;
pub mod materializer;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod search;
pub mod similarity;
pub mod snippet;
