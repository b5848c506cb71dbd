mod alert_service;
mod dashboard_service;
mod event_bus;
mod projector_service;
mod registry;
mod rule_engine;
pub mod store_bridge;
mod weather_service;

pub use alert_service::*;
pub use dashboard_service::*;
pub use event_bus::*;
pub use projector_service::*;
pub use registry::*;
pub use rule_engine::*;
pub use store_bridge::StoreBridge;
pub use weather_service::*;
