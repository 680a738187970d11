//! HTTP API for plantry-ss

pub mod health;
pub mod scan;
pub mod settings;
pub mod sse;

pub use health::health_routes;
pub use scan::scan_routes;
pub use settings::settings_routes;
pub use sse::scan_event_stream;
