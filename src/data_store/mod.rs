/// Committed-record representation and timestamps.
pub mod record;
/// In-memory reference store.
pub mod memory_store;
