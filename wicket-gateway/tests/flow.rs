//! End-to-end tests over a scripted in-memory transport: the login state
//! machine, resource calls, and the long-poll synchronizer, without a
//! gateway.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use wicket_gateway::{
    sync, AuthError, AuthState, ChatMessage, Client, FixedDelay, InMemoryStore, LoginFlow,
    Session, SessionStore, StepOutcome, Transport, TransportError,
};

// ─── Scripted transport ───────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Recorded {
    method: &'static str,
    path: String,
    body: Option<String>,
    session_phone: Option<String>,
}

enum Scripted {
    Body(String),
    Status(u16),
    /// Never answer — models a long-poll held open by the server.
    Hang,
}

/// Routes requests by path prefix to queues of scripted responses. A path
/// with no script (or an exhausted queue) gets a benign default: an empty
/// poll answer for `/api/poll/`, `{}` otherwise.
#[derive(Default)]
struct FakeTransport {
    log: Mutex<Vec<Recorded>>,
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
}

impl FakeTransport {
    fn script(&self, prefix: &str, response: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        if let Some((_, queue)) = routes.iter_mut().find(|(p, _)| p == prefix) {
            queue.push_back(response);
        } else {
            routes.push((prefix.to_string(), VecDeque::from([response])));
        }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    async fn respond(
        &self,
        method: &'static str,
        path: &str,
        body: Option<String>,
        session: Option<&Session>,
    ) -> Result<String, TransportError> {
        self.log.lock().unwrap().push(Recorded {
            method,
            path: path.to_string(),
            body,
            session_phone: session.map(|s| s.phone.clone()),
        });

        let scripted = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|(p, _)| path.starts_with(p.as_str()))
                .and_then(|(_, queue)| queue.pop_front())
        };

        match scripted {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Status(code)) => Err(TransportError::Status(code)),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None if path.starts_with("/api/poll/") => Ok(r#"{"has_new":false}"#.into()),
            None => Ok("{}".into()),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, path: &str, session: Option<&Session>)
        -> Result<String, TransportError>
    {
        self.respond("GET", path, None, session).await
    }

    async fn post(&self, path: &str, body: String, session: Option<&Session>)
        -> Result<String, TransportError>
    {
        self.respond("POST", path, Some(body), session).await
    }
}

fn msg(id: i64, text: &str) -> ChatMessage {
    ChatMessage {
        id,
        conversation_id: "42".into(),
        text: text.into(),
        sender: "Ann".into(),
        timestamp: 0,
        is_read: false,
        outbound: false,
    }
}

fn fast_policy() -> Arc<FixedDelay> {
    Arc::new(FixedDelay(Duration::from_millis(10)))
}

// ─── Auth flow ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn phone_then_code_authenticates() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/auth/request-code", Scripted::Body(r#"{"status":"code_sent"}"#.into()));
    transport.script(
        "/auth/login",
        Scripted::Body(r#"{"status":"success","phone":"+123456789012","session_data":"abc"}"#.into()),
    );

    let store = Arc::new(InMemoryStore::new());
    let mut flow = LoginFlow::new(transport.clone()).with_store(store.clone());

    flow.submit_phone("+123456789012").await.unwrap();
    assert!(matches!(flow.state(), AuthState::AwaitingCode { phone } if phone == "+123456789012"));

    match flow.submit_code("12345").await.unwrap() {
        StepOutcome::Authenticated(session) => {
            assert_eq!(session.phone, "+123456789012");
            assert_eq!(session.token, "abc");
        }
        other => panic!("expected Authenticated, got {other:?}"),
    }

    // Entering Authenticated handed the session to the store.
    assert_eq!(store.load().unwrap().unwrap().token, "abc");

    let reqs = transport.requests();
    assert_eq!(reqs[0].path, "/auth/request-code");
    assert_eq!(reqs[0].body.as_deref(), Some(r#"{"phone":"+123456789012"}"#));
    // Auth steps carry no session headers.
    assert!(reqs.iter().all(|r| r.session_phone.is_none()));
}

#[tokio::test]
async fn needs_password_goes_through_password_step() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/auth/request-code", Scripted::Body("{}".into()));
    transport.script(
        "/auth/login",
        Scripted::Body(r#"{"status":"password_required","needs_password":true}"#.into()),
    );
    transport.script(
        "/auth/password",
        Scripted::Body(r#"{"status":"success","phone":"+123456789012","session_data":"xyz"}"#.into()),
    );

    let mut flow = LoginFlow::new(transport.clone());
    flow.submit_phone("+123456789012").await.unwrap();

    // NeedsPassword transitions to AwaitingPassword and creates no session.
    assert!(matches!(flow.submit_code("12345").await.unwrap(), StepOutcome::PasswordNeeded));
    assert!(matches!(flow.state(), AuthState::AwaitingPassword { .. }));
    assert!(flow.session().is_none());

    match flow.submit_password("hunter2").await.unwrap() {
        StepOutcome::Authenticated(session) => assert_eq!(session.token, "xyz"),
        other => panic!("expected Authenticated, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_steps_leave_state_for_retry() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/auth/request-code", Scripted::Status(503));
    transport.script("/auth/request-code", Scripted::Body("{}".into()));
    transport.script("/auth/login", Scripted::Body(r#"{"error":"Invalid code"}"#.into()));
    transport.script(
        "/auth/login",
        Scripted::Body(r#"{"status":"success","phone":"+123456789012","session_data":"abc"}"#.into()),
    );

    let mut flow = LoginFlow::new(transport.clone());

    // Transport failure: still AwaitingPhone, same input retries.
    let err = flow.submit_phone("+123456789012").await.unwrap_err();
    assert!(matches!(err, AuthError::Transport(TransportError::Status(503))));
    assert!(matches!(flow.state(), AuthState::AwaitingPhone));
    flow.submit_phone("+123456789012").await.unwrap();

    // Gateway rejection: still AwaitingCode, corrected input succeeds.
    let err = flow.submit_code("99999").await.unwrap_err();
    assert!(matches!(err, AuthError::Denied(ref m) if m == "Invalid code"));
    assert!(matches!(flow.state(), AuthState::AwaitingCode { .. }));
    assert!(matches!(
        flow.submit_code("12345").await.unwrap(),
        StepOutcome::Authenticated(_)
    ));
}

#[tokio::test]
async fn local_validation_sends_nothing() {
    let transport = Arc::new(FakeTransport::default());
    let mut flow = LoginFlow::new(transport.clone());

    assert!(matches!(flow.submit_phone("+12345").await, Err(AuthError::Input(_))));
    assert!(matches!(flow.submit_code("123").await, Err(AuthError::OutOfTurn(_))));
    assert!(transport.requests().is_empty());

    flow.submit_phone("+123456789012").await.unwrap();
    assert!(matches!(flow.submit_code("123").await, Err(AuthError::Input(_))));
    assert!(matches!(flow.submit_password("x").await, Err(AuthError::OutOfTurn(_))));
}

// ─── Resource client ──────────────────────────────────────────────────────────

#[tokio::test]
async fn list_and_history_decode_typed_records() {
    let transport = Arc::new(FakeTransport::default());
    transport.script(
        "/api/chats",
        Scripted::Body(
            r#"{"chats":[
                {"id":42,"name":"Rust folks","last_message":"hi","unread_count":2,"type":"chat"},
                {"id":777000,"name":"Service","type":"user"}
            ],"count":2}"#
                .into(),
        ),
    );
    transport.script(
        "/api/messages/42",
        Scripted::Body(
            r#"{"messages":[
                {"id":5,"chat_id":42,"text":"old","sender":"Ann","timestamp":"2025-06-01T12:00:00Z"},
                {"id":7,"chat_id":42,"text":"new","sender":"Bob","out":true}
            ],"chat_id":"42"}"#
                .into(),
        ),
    );

    let client = Client::new(transport.clone(), Session::new("+123456789012", "tok"));

    let chats = client.list_conversations().await.unwrap();
    assert_eq!(chats.len(), 2);
    assert_eq!(chats[0].id, "42");
    assert_eq!(chats[0].unread_count, 2);
    assert_eq!(chats[1].name, "Service");

    let history = client.fetch_history("42", 20).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, 5);
    assert!(history[1].outbound);

    // Every authenticated call carried the session headers.
    let reqs = transport.requests();
    assert!(reqs.iter().all(|r| r.session_phone.as_deref() == Some("+123456789012")));
    assert_eq!(reqs[1].path, "/api/messages/42?limit=20");
}

#[tokio::test]
async fn unreadable_bodies_degrade_to_empty() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/api/chats", Scripted::Body("<html>gateway restarting</html>".into()));

    let client = Client::new(transport, Session::new("+123456789012", "tok"));
    assert!(client.list_conversations().await.unwrap().is_empty());
}

#[tokio::test]
async fn send_message_posts_escaped_json() {
    let transport = Arc::new(FakeTransport::default());
    let client = Client::new(transport.clone(), Session::new("+123456789012", "tok"));

    client.send_message("42", "line one\nsay \"hi\" \\o/").await.unwrap();

    let reqs = transport.requests();
    assert_eq!(reqs[0].method, "POST");
    assert_eq!(reqs[0].path, "/api/send");
    assert_eq!(
        reqs[0].body.as_deref(),
        Some(r#"{"chat_id":"42","text":"line one\nsay \"hi\" \\o/"}"#),
    );
}

// ─── Synchronizer ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn poll_merge_advances_cursor() {
    let transport = Arc::new(FakeTransport::default());
    transport.script(
        "/api/poll/42",
        Scripted::Body(
            r#"{"has_new":true,"messages":[
                {"id":8,"chat_id":42,"text":"a","sender":"Ann"},
                {"id":9,"chat_id":42,"text":"b","sender":"Ann"}
            ]}"#
            .into(),
        ),
    );

    let client = Client::new(transport.clone(), Session::new("+123456789012", "tok"));
    let seed = vec![msg(5, "x"), msg(7, "y"), msg(3, "z")];
    let (handle, mut feed) = sync::spawn(client, "42", seed, fast_policy());

    let snapshot = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("feed produced nothing")
        .unwrap();
    assert_eq!(snapshot.iter().map(|m| m.id).collect::<Vec<_>>(), vec![5, 7, 3, 8, 9]);

    // Let one more (empty) poll go out, then check the recorded cursors.
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.join().await;

    let polls: Vec<String> = transport
        .requests()
        .iter()
        .filter(|r| r.path.starts_with("/api/poll/42"))
        .map(|r| r.path.clone())
        .collect();
    assert!(polls[0].contains("after_message_id=7"), "first cursor: {}", polls[0]);
    assert!(polls[0].contains("timeout=30"));
    assert!(
        polls[1..].iter().all(|p| p.contains("after_message_id=9")),
        "cursor must advance to 9: {polls:?}"
    );
}

#[tokio::test]
async fn cancel_stops_task_and_feed_promptly() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/api/poll/42", Scripted::Hang);

    let client = Client::new(transport, Session::new("+123456789012", "tok"));
    let (handle, mut feed) = sync::spawn(client, "42", vec![msg(5, "x")], fast_policy());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.is_running());

    handle.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle.join())
        .await
        .expect("task did not exit after cancel");

    // No further notifications: the feed is closed.
    assert!(feed.next().await.is_none());
}

#[tokio::test]
async fn echo_merges_while_poll_is_in_flight() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/api/poll/42", Scripted::Hang);

    let client = Client::new(transport.clone(), Session::new("+123456789012", "tok"));
    let (handle, mut feed) = sync::spawn(client.clone(), "42", vec![msg(5, "x")], fast_policy());

    // The poll is hanging; a send completes and its echo goes through the
    // synchronizer's mailbox.
    client.send_message("42", "on my way").await.unwrap();
    handle.echo(ChatMessage::local_echo("42", "on my way"));

    let snapshot = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("echo never surfaced")
        .unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1].id, 0);
    assert!(snapshot[1].outbound);
    assert_eq!(snapshot[1].text, "on my way");

    handle.join().await;
}

#[tokio::test]
async fn failed_send_appends_no_echo() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/api/send", Scripted::Status(500));

    let client = Client::new(transport.clone(), Session::new("+123456789012", "tok"));
    let (handle, mut feed) = sync::spawn(client.clone(), "42", vec![msg(5, "x")], fast_policy());

    // The send fails, so the caller never echoes.
    let err = client.send_message("42", "lost").await.unwrap_err();
    assert!(matches!(err, TransportError::Status(500)));

    // Nothing reaches the feed (polls keep answering "no new data").
    let quiet = tokio::time::timeout(Duration::from_millis(100), feed.next()).await;
    assert!(quiet.is_err(), "no snapshot should have been produced");

    handle.join().await;
}

#[tokio::test]
async fn poll_errors_are_swallowed_and_polling_continues() {
    let transport = Arc::new(FakeTransport::default());
    transport.script("/api/poll/42", Scripted::Status(502));
    transport.script("/api/poll/42", Scripted::Status(502));
    transport.script(
        "/api/poll/42",
        Scripted::Body(r#"{"has_new":true,"messages":[{"id":6,"chat_id":42,"text":"back"}]}"#.into()),
    );

    let client = Client::new(transport, Session::new("+123456789012", "tok"));
    let (handle, mut feed) = sync::spawn(client, "42", vec![msg(5, "x")], fast_policy());

    // The two failures never surface; the third poll's data does.
    let snapshot = tokio::time::timeout(Duration::from_secs(2), feed.next())
        .await
        .expect("loop should have survived the failures")
        .unwrap();
    assert_eq!(snapshot.last().unwrap().id, 6);

    handle.join().await;
}
