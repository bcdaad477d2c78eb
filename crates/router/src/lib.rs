//! Intent classification and provider routing: a pure `classify` function,
//! per-intent fallback ladders, and the circuit breaker that filters them.

pub mod chain;
pub mod circuit;
pub mod classify;
pub mod router;

pub use chain::{apology_link, default_chain_for, ChainLink, Pipeline};
pub use circuit::CircuitBreaker;
pub use classify::{classify, Intent, IntentTag};
pub use router::Router;
