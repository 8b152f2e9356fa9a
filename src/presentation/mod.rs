// Presentation layer - HTTP and event-stream surface
pub mod app_state;
pub mod event_stream;
pub mod handlers;
