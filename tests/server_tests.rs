//! Wire-level tests: a live session serving on a Unix socket, driven by
//! plain blocking clients the way an SDK would.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::{Duration, Instant};

use arca::apikey::{AccessLevel, ApiKeyPermissions};
use arca::authz::Action;
use arca::config::Settings;
use arca::session::Session;
use tempfile::TempDir;

const MASTER_PW: &str = "correct horse battery staple";

fn serving_session(dir: &TempDir) -> (Session, std::path::PathBuf) {
    let settings = Settings::rooted_at(dir.path());
    let socket = settings.socket_path.clone();
    let mut session = Session::new(settings).expect("session");
    session.create_vault(MASTER_PW).expect("create vault");
    (session, socket)
}

/// One request, one response, one connection.
fn request(socket: &Path, line: &str) -> String {
    let mut stream = UnixStream::connect(socket).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    stream.write_all(line.as_bytes()).expect("write request");
    stream.write_all(b"\n").expect("write newline");

    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    assert!(response.ends_with('\n'), "responses are newline terminated");
    response.trim_end_matches('\n').to_string()
}

// ---------------------------------------------------------------------------
// No-auth mode (no API keys installed)
// ---------------------------------------------------------------------------

#[test]
fn no_auth_mode_serves_plain_requests() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", Some("prod DB")).unwrap();

    assert_eq!(request(&socket, "STATUS"), "OK|UNLOCKED|1|NO_AUTH");
    assert_eq!(request(&socket, "GET|db"), "OK|s3cret|prod DB");
    assert_eq!(request(&socket, "GET|missing"), "NOTFOUND");
    assert_eq!(request(&socket, "EXISTS|db"), "TRUE");
    assert_eq!(request(&socket, "EXISTS|missing"), "FALSE");
    assert_eq!(request(&socket, "LIST"), "OK|db");
    assert_eq!(request(&socket, "KEYS"), "OK|db");

    session.close();
}

#[test]
fn malformed_requests_get_an_error_not_a_disconnect() {
    let dir = TempDir::new().unwrap();
    let (session, socket) = serving_session(&dir);

    assert_eq!(request(&socket, "FETCH|db"), "ERROR|Unknown command");
    assert_eq!(request(&socket, "GET"), "ERROR|Unknown command");
    assert_eq!(request(&socket, "!!!"), "ERROR|Unknown command");

    // The server is still healthy afterwards.
    assert_eq!(request(&socket, "STATUS"), "OK|UNLOCKED|0|NO_AUTH");

    session.close();
}

#[test]
fn list_applies_case_insensitive_substring_filter() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("prod-db", "a", None).unwrap();
    session.add_secret("prod-api", "b", None).unwrap();
    session.add_secret("staging-db", "c", None).unwrap();

    assert_eq!(request(&socket, "LIST|PROD"), "OK|prod-api,prod-db");
    assert_eq!(request(&socket, "LIST|db"), "OK|prod-db,staging-db");
    assert_eq!(request(&socket, "LIST|nothing"), "OK|");

    session.close();
}

// ---------------------------------------------------------------------------
// Auth-required mode
// ---------------------------------------------------------------------------

#[test]
fn restricted_key_end_to_end() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", Some("prod DB")).unwrap();

    let (key, _) = session
        .generate_api_key(
            "ci",
            ApiKeyPermissions {
                level: AccessLevel::Restricted,
                allowed_secrets: vec!["db".into()],
                allowed_prefixes: vec![],
                can_list: false,
            },
        )
        .unwrap();

    // Installing the first key flips the server into auth mode.
    assert_eq!(request(&socket, "STATUS"), "OK|UNLOCKED|1|AUTH_REQUIRED");
    assert_eq!(request(&socket, &format!("AUTH|{key}")), "OK|AUTHENTICATED");
    assert_eq!(request(&socket, &format!("GET|{key}|db")), "OK|s3cret|prod DB");
    assert_eq!(
        request(&socket, &format!("GET|{key}|other")),
        "ERROR|Access denied to this secret"
    );
    assert_eq!(
        request(&socket, &format!("LIST|{key}")),
        "ERROR|Access denied - cannot list secrets"
    );

    session.close();
}

#[test]
fn exists_denial_is_indistinguishable_from_a_miss() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", None).unwrap();

    let (key, _) = session
        .generate_api_key(
            "ci",
            ApiKeyPermissions {
                level: AccessLevel::Restricted,
                allowed_secrets: vec!["db".into()],
                allowed_prefixes: vec![],
                can_list: false,
            },
        )
        .unwrap();

    // "other" does not exist.
    let absent = request(&socket, &format!("EXISTS|{key}|other"));
    // Now it does exist, but stays outside the permission set.
    session.add_secret("other", "hidden", None).unwrap();
    let present = request(&socket, &format!("EXISTS|{key}|other"));

    assert_eq!(absent, "FALSE");
    assert_eq!(absent, present, "denial must not reveal existence");

    // The key can still see its own secret.
    assert_eq!(request(&socket, &format!("EXISTS|{key}|db")), "TRUE");

    session.close();
}

#[test]
fn list_returns_only_the_authorized_subset() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("prod/db", "a", None).unwrap();
    session.add_secret("prod/api", "b", None).unwrap();
    session.add_secret("staging/db", "c", None).unwrap();

    let (key, _) = session
        .generate_api_key(
            "prod-reader",
            ApiKeyPermissions {
                level: AccessLevel::Restricted,
                allowed_secrets: vec![],
                allowed_prefixes: vec!["prod/*".into()],
                can_list: true,
            },
        )
        .unwrap();

    assert_eq!(request(&socket, &format!("LIST|{key}")), "OK|prod/api,prod/db");
    assert_eq!(request(&socket, &format!("LIST|{key}|db")), "OK|prod/db");

    session.close();
}

#[test]
fn invalid_key_is_rejected_on_gated_commands() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", None).unwrap();
    session.generate_api_key("real", ApiKeyPermissions::full()).unwrap();

    assert_eq!(
        request(&socket, "GET|arca_bogus|db"),
        "ERROR|Invalid or expired API Key"
    );
    assert_eq!(
        request(&socket, "EXISTS|arca_bogus|db"),
        "ERROR|Invalid or expired API Key"
    );

    session.close();
}

#[test]
fn revoked_key_fails_auth_and_is_audited() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", None).unwrap();

    let (key, entry) = session.generate_api_key("ci", ApiKeyPermissions::full()).unwrap();
    assert_eq!(request(&socket, &format!("AUTH|{key}")), "OK|AUTHENTICATED");

    session.revoke_api_key(entry.id).unwrap();
    assert_eq!(request(&socket, &format!("AUTH|{key}")), "ERROR|Invalid API Key");

    let recent = session.audit_recent(100);
    let failure = recent
        .iter()
        .rev()
        .find(|e| e.action == Action::Auth && !e.success)
        .expect("failed AUTH must be audited");
    assert_eq!(failure.api_key_name, "Invalid");

    // And the entry reaches the day file once the queue drains.
    session.audit_flush();
    let day_file = dir
        .path()
        .join("Logs")
        .join(format!("audit-{}.json", chrono::Utc::now().format("%Y-%m-%d")));
    let content = std::fs::read_to_string(day_file).expect("day file");
    assert!(content.contains("Invalid API Key"));

    session.close();
}

#[test]
fn successful_requests_update_last_used_at() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", None).unwrap();
    let (key, _) = session.generate_api_key("ci", ApiKeyPermissions::full()).unwrap();

    assert!(session.list_api_keys()[0].last_used_at.is_none());
    assert_eq!(request(&socket, &format!("GET|{key}|db")), "OK|s3cret|");

    // The callback runs off the handler path; give it a moment.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if session.list_api_keys()[0].last_used_at.is_some() {
            break;
        }
        assert!(Instant::now() < deadline, "last_used_at was never stamped");
        std::thread::sleep(Duration::from_millis(20));
    }

    session.close();
}

#[test]
fn requests_are_audited_with_caller_identity() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);
    session.add_secret("db", "s3cret", None).unwrap();

    // Anonymous mode first.
    assert_eq!(request(&socket, "GET|db"), "OK|s3cret|");
    let recent = session.audit_recent(10);
    let last = recent.last().unwrap();
    assert_eq!(last.api_key_name, "Anonymous");
    assert_eq!(last.api_key_id, "N/A");
    assert_eq!(last.action, Action::Get);
    assert!(last.success);
    assert_eq!(last.secret_key.as_deref(), Some("db"));

    // Authenticated mode.
    let (key, entry) = session.generate_api_key("ci", ApiKeyPermissions::full()).unwrap();
    assert_eq!(request(&socket, &format!("GET|{key}|db")), "OK|s3cret|");
    let recent = session.audit_recent(10);
    let last = recent.last().unwrap();
    assert_eq!(last.api_key_name, "ci");
    assert_eq!(last.api_key_id, entry.id.to_string());

    session.close();
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stop_returns_within_two_seconds_despite_idle_connections() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);

    // A client that connects and never sends a request.
    let idle = UnixStream::connect(&socket).expect("connect");

    let started = Instant::now();
    session.lock();
    let elapsed = started.elapsed();
    assert!(
        elapsed < Duration::from_secs(3),
        "lock took {elapsed:?}, expected the drain deadline to bound it"
    );

    drop(idle);
    session.close();
}

#[test]
fn lock_removes_the_socket_and_unlock_restores_it() {
    let dir = TempDir::new().unwrap();
    let (mut session, socket) = serving_session(&dir);

    assert_eq!(request(&socket, "STATUS"), "OK|UNLOCKED|0|NO_AUTH");
    session.lock();
    assert!(UnixStream::connect(&socket).is_err(), "socket should be gone");

    session.unlock(MASTER_PW).unwrap();
    assert_eq!(request(&socket, "STATUS"), "OK|UNLOCKED|0|NO_AUTH");

    session.close();
}
