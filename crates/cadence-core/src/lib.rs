pub mod activity;
pub mod clock;
pub mod ids;
pub mod recurrence;
pub mod sla;
pub mod ticket;

pub use activity::{Activity, ActivityDetail, ActivityKind, Priority, Severity};
pub use clock::{Clock, FixedClock, SystemClock};
pub use ticket::TicketStatus;
