mod alert;
mod catalogue;
mod device;
mod rule;
mod status;
mod weather;

pub use alert::*;
pub use catalogue::*;
pub use device::*;
pub use rule::*;
pub use status::*;
pub use weather::*;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Timestamp in the ISO-8601 form the store records carry (`dataTime`, `lastUpdate`).
pub fn timestamp_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
