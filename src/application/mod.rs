// Application layer - use cases around the range picker
pub mod auto_sync;
pub mod clock;
pub mod coordinator;
pub mod publisher;
pub mod reconciler;
pub mod state_store;
