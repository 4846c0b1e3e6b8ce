pub mod aggregate;
pub mod changes;
pub mod models;
pub mod normalize;
pub mod schedule;

pub use aggregate::{aggregate, live_count, FeedFilter};
pub use changes::detect_changes;
pub use schedule::{upcoming, ScheduleDay};
