//! The IPC request server.
//!
//! Listens on a local Unix-domain socket (the `arca-vault-simple`
//! endpoint).  Each connection carries one request line and receives one
//! response line.  The accept loop and per-connection handlers run on a
//! tokio runtime owned by a dedicated thread, so the controller surface
//! stays synchronous; `stop()` signals the loop and gives in-flight
//! handlers two seconds to drain before aborting them.
//!
//! Per-connection failures are isolated: a malformed request is answered
//! with `ERROR|Unknown command`, an I/O error ends only that connection,
//! and an accept error backs off 100 ms and continues.

pub mod protocol;

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::apikey::{self, ApiKeyEntry};
use crate::audit::{AuditEntry, AuditLog, ANONYMOUS_ID, INVALID_NAME};
use crate::authz::{authorize, Action, Decision};
use crate::errors::Result;
use crate::vault::VaultState;
use protocol::{Request, Response};

/// How long outstanding handlers get to finish after a stop signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Back-off after a failed accept.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Callback invoked with the key hash of every successfully
/// authenticated request, off the handler's critical path.
pub type ApiKeyUsedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Everything a connection handler needs.
pub struct ServerContext {
    pub state: Arc<RwLock<VaultState>>,
    pub audit: AuditLog,
    /// Set at start time from the live key count; flipping it requires a
    /// restart because it changes the request grammar.
    pub require_auth: bool,
    pub on_api_key_used: ApiKeyUsedCallback,
}

/// Handle to a running server.  Dropping it stops the server.
pub struct VaultServer {
    shutdown: watch::Sender<bool>,
    thread: Option<std::thread::JoinHandle<()>>,
    socket_path: PathBuf,
}

impl VaultServer {
    /// Bind the socket and start serving.
    ///
    /// A stale socket file from a previous run is removed before binding.
    pub fn start(socket_path: PathBuf, ctx: ServerContext) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let listener = {
            let _guard = runtime.enter();
            UnixListener::bind(&socket_path)?
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let ctx = Arc::new(ctx);

        info!(path = %socket_path.display(), require_auth = ctx.require_auth, "ipc server listening");

        let thread = std::thread::Builder::new()
            .name("arca-ipc-server".into())
            .spawn(move || {
                runtime.block_on(accept_loop(listener, shutdown_rx, ctx));
            })?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
            socket_path,
        })
    }

    /// Signal the accept loop to exit and wait for it.  Returns within
    /// the drain timeout regardless of in-flight connections.
    pub fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = std::fs::remove_file(&self.socket_path);
        info!("ipc server stopped");
    }
}

impl Drop for VaultServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Accept loop
// ---------------------------------------------------------------------------

async fn accept_loop(
    listener: UnixListener,
    mut shutdown: watch::Receiver<bool>,
    ctx: Arc<ServerContext>,
) {
    let mut handlers: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let ctx = Arc::clone(&ctx);
                    handlers.spawn(handle_connection(stream, ctx));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed, backing off");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            },
            _ = shutdown.changed() => break,
        }

        // Reap handlers that already finished.
        while handlers.try_join_next().is_some() {}
    }

    // Give outstanding handlers a bounded window, then cut them off.
    let drain = async {
        while handlers.join_next().await.is_some() {}
    };
    if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        debug!("drain timeout expired, aborting remaining handlers");
        handlers.abort_all();
    }
}

async fn handle_connection(stream: UnixStream, ctx: Arc<ServerContext>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => return, // client went away without a request
        Ok(_) => {}
        Err(e) => {
            debug!(error = %e, "connection read failed");
            return;
        }
    }

    // The audit record is enqueued inside dispatch, strictly before the
    // response bytes go out.
    let response = dispatch(&line, &ctx);

    let mut bytes = response.to_string().into_bytes();
    bytes.push(b'\n');
    if let Err(e) = write_half.write_all(&bytes).await {
        debug!(error = %e, "connection write failed");
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// The authenticated identity behind a request.
enum Caller {
    /// No-auth mode: unrestricted.
    Anonymous,
    Key(ApiKeyEntry),
}

impl Caller {
    fn audit_name(&self) -> String {
        match self {
            Self::Anonymous => crate::audit::ANONYMOUS_NAME.to_string(),
            Self::Key(entry) => entry.name.clone(),
        }
    }

    fn audit_id(&self) -> String {
        match self {
            Self::Anonymous => ANONYMOUS_ID.to_string(),
            Self::Key(entry) => entry.id.to_string(),
        }
    }

    fn decide(&self, action: Action, target: Option<&str>) -> Decision {
        match self {
            Self::Anonymous => Decision::Allow,
            Self::Key(entry) => authorize(entry, action, target),
        }
    }
}

fn dispatch(line: &str, ctx: &ServerContext) -> Response {
    let Some(request) = protocol::parse(line, ctx.require_auth) else {
        ctx.audit.record(AuditEntry::anonymous(
            Action::Unknown,
            None,
            false,
            Some("Unknown command".into()),
        ));
        return Response::Error("Unknown command".into());
    };

    match request {
        Request::Status => {
            let count = read_state(ctx).secret_count();
            ctx.audit
                .record(AuditEntry::anonymous(Action::Status, None, true, None));
            Response::Status {
                count,
                require_auth: ctx.require_auth,
            }
        }

        Request::Auth { api_key } => {
            let hash = apikey::hash_key(&api_key);
            let entry = read_state(ctx).api_key_by_hash(&hash).cloned();
            match entry {
                Some(entry) => {
                    ctx.audit.record(AuditEntry::new(
                        entry.name.clone(),
                        entry.id.to_string(),
                        Action::Auth,
                        None,
                        true,
                        None,
                    ));
                    notify_key_used(ctx, &entry.key_hash);
                    Response::Authenticated
                }
                None => {
                    ctx.audit.record(AuditEntry::new(
                        INVALID_NAME,
                        ANONYMOUS_ID,
                        Action::Auth,
                        None,
                        false,
                        Some("Invalid API Key".into()),
                    ));
                    Response::Error("Invalid API Key".into())
                }
            }
        }

        Request::Get { api_key, secret_key } => {
            let caller = match authenticate(ctx, api_key.as_deref(), Action::Get, Some(&secret_key)) {
                Ok(caller) => caller,
                Err(response) => return response,
            };
            handle_get(ctx, &caller, &secret_key)
        }

        Request::Exists { api_key, secret_key } => {
            let caller =
                match authenticate(ctx, api_key.as_deref(), Action::Exists, Some(&secret_key)) {
                    Ok(caller) => caller,
                    Err(response) => return response,
                };
            handle_exists(ctx, &caller, &secret_key)
        }

        Request::List { api_key, filter } => {
            let caller = match authenticate(ctx, api_key.as_deref(), Action::List, None) {
                Ok(caller) => caller,
                Err(response) => return response,
            };
            handle_list(ctx, &caller, filter.as_deref())
        }
    }
}

/// Resolve the caller for an authentication-gated command.  On failure the
/// audit entry is already written and the wire response is returned as
/// `Err`.
fn authenticate(
    ctx: &ServerContext,
    api_key: Option<&str>,
    action: Action,
    secret_key: Option<&str>,
) -> std::result::Result<Caller, Response> {
    if !ctx.require_auth {
        return Ok(Caller::Anonymous);
    }

    let presented = api_key.unwrap_or_default();
    let hash = apikey::hash_key(presented);
    match read_state(ctx).api_key_by_hash(&hash).cloned() {
        Some(entry) => {
            notify_key_used(ctx, &entry.key_hash);
            Ok(Caller::Key(entry))
        }
        None => {
            ctx.audit.record(AuditEntry::new(
                INVALID_NAME,
                ANONYMOUS_ID,
                action,
                secret_key.map(String::from),
                false,
                Some("Invalid or expired API Key".into()),
            ));
            Err(Response::Error("Invalid or expired API Key".into()))
        }
    }
}

fn handle_get(ctx: &ServerContext, caller: &Caller, secret_key: &str) -> Response {
    if !caller.decide(Action::Get, Some(secret_key)).is_allowed() {
        audit_for(ctx, caller, Action::Get, Some(secret_key), false, Some("Access denied to this secret"));
        return Response::Error("Access denied to this secret".into());
    }

    let found = read_state(ctx)
        .get_secret(secret_key)
        .map(|s| (s.value.clone(), s.description.clone()));
    match found {
        Some((value, description)) => {
            audit_for(ctx, caller, Action::Get, Some(secret_key), true, None);
            Response::Secret { value, description }
        }
        None => {
            audit_for(ctx, caller, Action::Get, Some(secret_key), false, Some("Secret not found"));
            Response::NotFound
        }
    }
}

fn handle_exists(ctx: &ServerContext, caller: &Caller, secret_key: &str) -> Response {
    // Denials are reported as FALSE, indistinguishable from a miss.
    if !caller.decide(Action::Exists, Some(secret_key)).is_allowed() {
        audit_for(ctx, caller, Action::Exists, Some(secret_key), false, Some("Access denied"));
        return Response::Exists(false);
    }

    let exists = read_state(ctx).contains_secret(secret_key);
    audit_for(ctx, caller, Action::Exists, Some(secret_key), true, None);
    Response::Exists(exists)
}

fn handle_list(ctx: &ServerContext, caller: &Caller, filter: Option<&str>) -> Response {
    if !caller.decide(Action::List, None).is_allowed() {
        audit_for(ctx, caller, Action::List, None, false, Some("Access denied - cannot list secrets"));
        return Response::Error("Access denied - cannot list secrets".into());
    }

    let keys: Vec<String> = {
        let state = read_state(ctx);
        state
            .list_secrets(filter)
            .into_iter()
            .filter(|entry| caller.decide(Action::Get, Some(&entry.key)).is_allowed())
            .map(|entry| entry.key.clone())
            .collect()
    };

    audit_for(ctx, caller, Action::List, None, true, None);
    Response::Keys(keys)
}

fn audit_for(
    ctx: &ServerContext,
    caller: &Caller,
    action: Action,
    secret_key: Option<&str>,
    success: bool,
    error: Option<&str>,
) {
    ctx.audit.record(AuditEntry::new(
        caller.audit_name(),
        caller.audit_id(),
        action,
        secret_key.map(String::from),
        success,
        error.map(String::from),
    ));
}

fn read_state(ctx: &ServerContext) -> std::sync::RwLockReadGuard<'_, VaultState> {
    ctx.state.read().expect("vault state lock")
}

/// Hand the key hash to the session off the handler path.
fn notify_key_used(ctx: &ServerContext, key_hash: &str) {
    let callback = Arc::clone(&ctx.on_api_key_used);
    let hash = key_hash.to_string();
    tokio::task::spawn_blocking(move || callback(&hash));
}
