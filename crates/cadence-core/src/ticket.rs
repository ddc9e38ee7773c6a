//! Support-ticket identity and status transitions.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Support-ticket workflow status.
///
/// The forward chain is open → in_progress → pending_customer → escalated →
/// resolved → closed. `Escalated` is reachable from any non-terminal state,
/// and `Resolved`/`Closed` from any state (completion closes a ticket no
/// matter where it is in the workflow).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    PendingCustomer,
    Escalated,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Whether a direct transition to `next` is valid.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        if self == next {
            return true;
        }
        match next {
            // Completion can close out any state.
            Self::Resolved | Self::Closed => true,
            // Escalation from any non-terminal state.
            Self::Escalated => !self.is_terminal(),
            Self::InProgress => self == Self::Open,
            Self::PendingCustomer => self == Self::InProgress,
            Self::Open => false,
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::InProgress => write!(f, "in_progress"),
            Self::PendingCustomer => write!(f, "pending_customer"),
            Self::Escalated => write!(f, "escalated"),
            Self::Resolved => write!(f, "resolved"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "pending_customer" => Ok(Self::PendingCustomer),
            "escalated" => Ok(Self::Escalated),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown ticket status: {other}")),
        }
    }
}

const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 4;

/// Generate a ticket number: `TKT-<base36 millis, uppercase>-<4 random
/// alphanumeric uppercase>`. Generated exactly once per ticket; the store
/// enforces global uniqueness with a UNIQUE column.
pub fn generate_ticket_number(unix_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARS[rng.gen_range(0..SUFFIX_CHARS.len())] as char)
        .collect();
    format!("TKT-{}-{}", base36(unix_millis.max(0) as u64), suffix)
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}
