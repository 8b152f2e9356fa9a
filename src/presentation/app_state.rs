// Application state for HTTP handlers
use crate::application::coordinator::RangeCoordinator;

pub struct AppState {
    pub coordinator: RangeCoordinator,
}
