//! Authorization: a pure mapping from (key, action, target) to a decision.
//!
//! No I/O, no clocks, no state — the request server consults this for every
//! authenticated dispatch, and tests can enumerate it exhaustively.

use serde::{Deserialize, Serialize};

use crate::apikey::{AccessLevel, ApiKeyEntry};

/// The request actions a caller can perform.  Also the action vocabulary
/// of the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Get,
    Exists,
    List,
    Auth,
    Status,
    Unknown,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Exists => "EXISTS",
            Self::List => "LIST",
            Self::Auth => "AUTH",
            Self::Status => "STATUS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// The outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Decide whether `entry` may perform `action` on `target`.
///
/// - `Full` keys may do anything, listing included.
/// - `Restricted` (and legacy `ReadOnly`) keys may `Get`/`Exists` a target
///   that matches `allowed_secrets` exactly or `allowed_prefixes` by
///   prefix, both case-insensitive; `List` requires `can_list`.
/// - `Auth` and `Status` are always allowed — they are the probes a client
///   uses before touching any secret.
pub fn authorize(entry: &ApiKeyEntry, action: Action, target: Option<&str>) -> Decision {
    match action {
        Action::Auth | Action::Status => Decision::Allow,
        Action::Unknown => Decision::Deny,
        Action::List => match entry.permissions.level {
            AccessLevel::Full => Decision::Allow,
            AccessLevel::Restricted | AccessLevel::ReadOnly => {
                if entry.permissions.can_list {
                    Decision::Allow
                } else {
                    Decision::Deny
                }
            }
        },
        Action::Get | Action::Exists => match entry.permissions.level {
            AccessLevel::Full => Decision::Allow,
            AccessLevel::Restricted | AccessLevel::ReadOnly => {
                let Some(target) = target else {
                    return Decision::Deny;
                };
                if secret_allowed(entry, target) {
                    Decision::Allow
                } else {
                    Decision::Deny
                }
            }
        },
    }
}

/// Whether a restricted key's permission set covers `target`.
fn secret_allowed(entry: &ApiKeyEntry, target: &str) -> bool {
    let target = target.to_lowercase();

    if entry
        .permissions
        .allowed_secrets
        .iter()
        .any(|s| s.to_lowercase() == target)
    {
        return true;
    }

    entry.permissions.allowed_prefixes.iter().any(|p| {
        let prefix = p.trim_end_matches('*').to_lowercase();
        target.starts_with(&prefix)
    })
}
