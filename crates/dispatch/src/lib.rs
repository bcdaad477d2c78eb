//! The Dispatch & Coalescing Engine: per-provider pacing, in-flight request
//! deduplication, the single `GatewayContext`, and the Dispatch Pipeline
//! that composes every other crate in the workspace for one streaming
//! request.

pub mod coalesce;
pub mod context;
pub mod event;
pub mod pacer;
pub mod pipeline;
pub mod sanitize;

pub use coalesce::Coalescer;
pub use context::GatewayContext;
pub use event::{DeltaPayload, DonePayload, DoneReason, ErrorPayload, MetaPayload, SseEvent};
pub use pacer::{Pacer, PacerLease, PacerRegistry};
pub use pipeline::{validate, DispatchError, DispatchRequest, Scope};
