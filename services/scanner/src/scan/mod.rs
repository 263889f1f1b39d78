pub mod controller;
pub mod resolve_task;
pub mod scan_task;
pub mod state;

// Re-export the controller to make it easily accessible to the web layer
// and to integration tests.
pub use controller::ScanController;
pub use state::{AppState, SessionState};
