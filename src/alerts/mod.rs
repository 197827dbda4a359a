/// Admission control, fan-out dispatch and delivery bookkeeping
pub mod dispatcher;
pub mod payload;
pub mod rate_limiter;
pub mod stats;
pub mod transport;

pub use dispatcher::{Channel, ChannelOutcome, DispatchReport, Dispatcher};
pub use rate_limiter::{RateLimitKey, RateLimiter};
pub use stats::{NotificationStats, StatsTracker};
pub use transport::{HttpTransport, MockResponse, MockTransport, OutboundRequest, Transport};
