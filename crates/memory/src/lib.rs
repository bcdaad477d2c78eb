//! Conversation memory: per-thread turn history and summaries, plus
//! cross-thread memory fragments shared within an organisation.

pub mod extract;
pub mod fragment;
pub mod manager;
pub mod redact;
pub mod retrieval;
pub mod schema;
pub mod store;
pub mod tokens;

pub use extract::extract_self_assertions;
pub use fragment::{eligible_for_shared_tier, FragmentPersistence, InMemoryFragmentStore};
pub use manager::MemoryManager;
pub use redact::redact_pii;
pub use retrieval::context_for_prompt;
pub use schema::{FragmentTier, MemoryError, MemoryFragment, Role, Thread, Turn};
pub use store::{InMemoryThreadStore, ThreadPersistence};
