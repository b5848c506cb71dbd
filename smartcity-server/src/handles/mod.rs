mod alert_handle;
mod device_handle;
mod display_handle;
mod rule_handle;
mod sse_handle;
mod weather_handle;

pub use alert_handle::*;
pub use device_handle::*;
pub use display_handle::*;
pub use rule_handle::*;
pub use sse_handle::*;
pub use weather_handle::*;
