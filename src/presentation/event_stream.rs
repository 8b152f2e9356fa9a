// Server-sent event stream of published windows
use crate::domain::selection::WindowPayload;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};

/// Stream every published window as a `window` event.
///
/// A slow client that falls behind the channel gets one `lagged` event with
/// the number of skipped windows and then continues from the newest one.
pub fn window_stream(
    mut rx: broadcast::Receiver<WindowPayload>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(payload) => match Event::default().event("window").json_data(&payload) {
                    Ok(event) => yield Ok(event),
                    Err(e) => tracing::warn!("Failed to encode window event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Window subscriber lagged by {} messages", skipped);
                    yield Ok(Event::default().event("lagged").data(skipped.to_string()));
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

pub fn sse_from_receiver(
    rx: broadcast::Receiver<WindowPayload>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(window_stream(rx)).keep_alive(KeepAlive::default())
}
