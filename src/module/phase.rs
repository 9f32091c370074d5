//! Request processing phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle phase a lookup runs in. Each phase may have its own policy file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Request received (authorize).
    Recv,
    /// Accounting request received (preacct).
    RecvAccounting,
    Authenticate,
    /// Reply about to be sent (post-auth).
    Send,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Recv,
        Phase::RecvAccounting,
        Phase::Authenticate,
        Phase::Send,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Recv => "recv",
            Phase::RecvAccounting => "recv_accounting",
            Phase::Authenticate => "authenticate",
            Phase::Send => "send",
        }
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            Phase::Recv => 0,
            Phase::RecvAccounting => 1,
            Phase::Authenticate => 2,
            Phase::Send => 3,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "unknown phase '{}', expected one of: recv, recv_accounting, authenticate, send",
                    s
                )
            })
    }
}
