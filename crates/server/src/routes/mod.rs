//! One module per resource, mirroring the endpoint groups in spec.md §6.

pub mod audit;
pub mod cancel;
pub mod messages;
pub mod providers;
pub mod threads;
