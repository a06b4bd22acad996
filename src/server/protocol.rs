//! The line-delimited request/response protocol.
//!
//! Each connection carries exactly one request and one response, UTF-8,
//! newline terminated, fields separated by `|`:
//!
//! ```text
//! STATUS
//! AUTH   | <api_key>
//! GET    | <api_key>? | <secret_key>
//! EXISTS | <api_key>? | <secret_key>
//! LIST   | <api_key>? | <filter>?
//! KEYS   | <api_key>? | <filter>?      (alias of LIST)
//! ```
//!
//! The `<api_key>` field is present exactly when the server requires
//! authentication, so the same position parses differently per mode.

use std::fmt;

use crate::authz::Action;

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Status,
    Auth {
        api_key: String,
    },
    Get {
        api_key: Option<String>,
        secret_key: String,
    },
    Exists {
        api_key: Option<String>,
        secret_key: String,
    },
    List {
        api_key: Option<String>,
        filter: Option<String>,
    },
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Self::Status => Action::Status,
            Self::Auth { .. } => Action::Auth,
            Self::Get { .. } => Action::Get,
            Self::Exists { .. } => Action::Exists,
            Self::List { .. } => Action::List,
        }
    }
}

/// Parse one request line.  `None` means the line is malformed; the
/// dispatcher answers `ERROR|Unknown command` without disconnecting.
pub fn parse(line: &str, require_auth: bool) -> Option<Request> {
    let mut fields = line.trim_end_matches(&['\r', '\n'][..]).split('|').map(str::trim);
    let command = fields.next()?.to_ascii_uppercase();
    let rest: Vec<&str> = fields.collect();

    match command.as_str() {
        "STATUS" if rest.is_empty() => Some(Request::Status),
        "AUTH" => match rest.as_slice() {
            [key] if !key.is_empty() => Some(Request::Auth {
                api_key: (*key).to_string(),
            }),
            _ => None,
        },
        "GET" | "EXISTS" => {
            let (api_key, secret_key) = split_credential(&rest, require_auth, false)?;
            let secret_key = secret_key?;
            if secret_key.is_empty() {
                return None;
            }
            if command == "GET" {
                Some(Request::Get { api_key, secret_key })
            } else {
                Some(Request::Exists { api_key, secret_key })
            }
        }
        "LIST" | "KEYS" => {
            let (api_key, filter) = split_credential(&rest, require_auth, true)?;
            let filter = filter.filter(|f| !f.is_empty());
            Some(Request::List { api_key, filter })
        }
        _ => None,
    }
}

/// Split `rest` into the optional credential and the trailing operand.
///
/// With `require_auth` the first field is the API key; without it the
/// first field is already the operand.  `operand_optional` is true for
/// LIST, whose filter may be absent entirely.
fn split_credential(
    rest: &[&str],
    require_auth: bool,
    operand_optional: bool,
) -> Option<(Option<String>, Option<String>)> {
    if require_auth {
        match rest {
            [key] if operand_optional && !key.is_empty() => Some((Some((*key).to_string()), None)),
            [key, operand] if !key.is_empty() => {
                Some((Some((*key).to_string()), Some((*operand).to_string())))
            }
            _ => None,
        }
    } else {
        match rest {
            [] if operand_optional => Some((None, None)),
            [operand] => Some((None, Some((*operand).to_string()))),
            _ => None,
        }
    }
}

/// A wire response.  `Display` renders the exact bytes before the
/// trailing newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `OK|UNLOCKED|<count>|<AUTH_REQUIRED or NO_AUTH>`
    Status { count: usize, require_auth: bool },
    /// `OK|AUTHENTICATED`
    Authenticated,
    /// `OK|<value>|<description>`
    Secret {
        value: String,
        description: Option<String>,
    },
    /// `NOTFOUND`
    NotFound,
    /// `TRUE` / `FALSE`
    Exists(bool),
    /// `OK|<csv of keys>`
    Keys(Vec<String>),
    /// `ERROR|<reason>`
    Error(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { count, require_auth } => {
                let mode = if *require_auth { "AUTH_REQUIRED" } else { "NO_AUTH" };
                write!(f, "OK|UNLOCKED|{count}|{mode}")
            }
            Self::Authenticated => write!(f, "OK|AUTHENTICATED"),
            Self::Secret { value, description } => {
                write!(f, "OK|{value}|{}", description.as_deref().unwrap_or(""))
            }
            Self::NotFound => write!(f, "NOTFOUND"),
            Self::Exists(true) => write!(f, "TRUE"),
            Self::Exists(false) => write!(f, "FALSE"),
            Self::Keys(keys) => write!(f, "OK|{}", keys.join(",")),
            Self::Error(reason) => write!(f, "ERROR|{reason}"),
        }
    }
}
