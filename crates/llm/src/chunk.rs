//! The wire type streamed from a `ProviderAdapter` through the Coalescer to
//! the SSE endpoint. Tagged so the client can discriminate without
//! inspecting payload shape.

use serde::{Deserialize, Serialize};

use crate::types::Usage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// Incremental text content, forwarded to the client as a `delta` SSE
    /// event as soon as it is produced — this is what TTFT is measured
    /// against.
    Delta { text: String },
    /// Out-of-band metadata (which provider/model actually served the
    /// request), emitted once at the start of a stream.
    Meta { provider: String, model: String },
    /// Token accounting, emitted once at the end of a stream when the
    /// provider reports it.
    Usage(Usage),
    /// Terminal marker; no further chunks follow for this request.
    Done,
}
