mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use action_locator::Capability;
use channel_session::{ChannelError, Lifecycle};
use chatrelay_core_types::{ChannelStatus, ChatContext, EventKind};
use futures::StreamExt;
use support::{profile, FakeAuth, Harness, CHAT_URL};

#[tokio::test(start_paused = true)]
async fn send_without_login_touches_nothing() {
    let h = Harness::new(FakeAuth::logged_out());
    h.session.initialize().await.unwrap();
    let events = h.record();

    let err = h.session.send_message("hello", None).await.unwrap_err();

    assert!(err.is_not_authenticated(), "{err}");
    assert!(err.to_string().contains("'test'"));
    assert!(h.page.navigations().is_empty());
    assert!(h.page.keys().is_empty());
    assert!(h.page.clicks().is_empty());
    assert_eq!(h.page.interactions(), 0);
    assert!(events.lock().contains(&EventKind::Error));
    assert!(h.session.get_status().last_error.is_some());
}

#[tokio::test(start_paused = true)]
async fn send_types_submits_and_returns_settled_reply() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page
        .script_text(".reply", ["", "Hel", "Hello", "Hello world"]);
    h.session.initialize().await.unwrap();
    let events = h.record();

    let reply = h.session.send_message("hi", None).await.unwrap();

    assert_eq!(reply, "Hello world");
    assert_eq!(h.page.navigations(), vec![CHAT_URL]);
    assert_eq!(h.page.clicks(), vec!["#prompt", "#send"]);
    assert_eq!(h.page.input_value(), "hi");

    let kinds = events.lock().clone();
    let sent = kinds.iter().position(|k| *k == EventKind::MessageSent);
    let received = kinds.iter().position(|k| *k == EventKind::MessageReceived);
    assert!(sent.is_some() && received.is_some());
    assert!(sent < received);

    let status = h.session.get_status();
    assert!(status.connected && status.authenticated);
    assert!(status.last_activity.is_some());
    assert!(status.response_time_ms.is_some());
    assert!(status.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn code_context_follows_the_message() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["ok"]);
    h.session.initialize().await.unwrap();

    let context = ChatContext::with_code("let x = 1;").language("rust");
    h.session.send_message("explain", Some(&context)).await.unwrap();

    let typed = h.page.input_value();
    assert!(typed.starts_with("explain"));
    assert!(typed.contains("```rust\nlet x = 1;\n```"));
}

#[tokio::test(start_paused = true)]
async fn missing_send_button_falls_back_to_enter() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.remove_element("#send");
    h.page.script_text(".reply", ["done"]);
    h.session.initialize().await.unwrap();

    let reply = h.session.send_message("hi", None).await.unwrap();

    assert_eq!(reply, "done");
    assert_eq!(h.page.submitted(), vec!["hi"]);
    assert_eq!(h.page.clicks(), vec!["#prompt"]);
}

#[tokio::test(start_paused = true)]
async fn missing_send_button_without_enter_fallback_is_an_error() {
    let mut profile = profile("test");
    profile.submit_with_enter = false;
    let h = Harness::with_profile(profile, FakeAuth::logged_in());
    h.page.remove_element("#send");
    h.page.script_text(".reply", ["never read"]);
    h.session.initialize().await.unwrap();

    let err = h.session.send_message("hi", None).await.unwrap_err();

    match err {
        ChannelError::ElementNotFound {
            capability,
            candidates,
            ..
        } => {
            assert_eq!(capability, Capability::SendButton);
            assert_eq!(candidates, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.page.submitted().is_empty());
    assert_eq!(h.page.text_reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_input_box_reports_budget() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.remove_element("#prompt");
    h.session.initialize().await.unwrap();

    let err = h.session.send_message("hi", None).await.unwrap_err();

    match err {
        ChannelError::ElementNotFound {
            capability,
            elapsed_ms,
            ..
        } => {
            assert_eq!(capability, Capability::InputBox);
            assert_eq!(elapsed_ms, 5_000);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.page.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reply_that_never_appears_is_a_discovery_timeout() {
    let h = Harness::new(FakeAuth::logged_in());
    h.session.initialize().await.unwrap();

    let err = h.session.send_message("hi", None).await.unwrap_err();

    assert!(
        matches!(err, ChannelError::ReplyDiscoveryTimeout { elapsed_ms: 30_000, .. }),
        "{err}"
    );
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn stream_checks_login_on_first_poll() {
    let h = Harness::new(FakeAuth::logged_out());
    h.session.initialize().await.unwrap();

    let mut fragments = h.session.send_message_stream("hi", None);
    assert_eq!(h.auth.checks.load(Ordering::SeqCst), 0);

    let first = fragments.next().await.expect("an item");
    assert!(first.unwrap_err().is_not_authenticated());
    assert!(fragments.next().await.is_none());
    assert!(h.page.navigations().is_empty());
    assert!(h.page.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stream_yields_growing_reply() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page
        .script_text(".reply", ["", "Hel", "Hello", "Hello world"]);
    h.session.initialize().await.unwrap();
    let events = h.record();

    let fragments: Vec<String> = h
        .session
        .send_message_stream("hi", None)
        .map(|item| item.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["Hel", "lo", " world"]);
    assert!(events.lock().contains(&EventKind::MessageReceived));
    assert!(h.session.get_status().last_activity.is_some());
}

#[tokio::test(start_paused = true)]
async fn abandoned_stream_stops_querying_and_frees_the_session() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page
        .script_text(".reply", ["", "a", "ab", "abc", "abcd"]);
    h.session.initialize().await.unwrap();

    let mut fragments = h.session.send_message_stream("hi", None);
    assert_eq!(fragments.next().await.unwrap().unwrap(), "a");
    assert_eq!(fragments.next().await.unwrap().unwrap(), "b");
    drop(fragments);

    let after_drop = h.page.interactions();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.page.interactions(), after_drop);

    // The session lock went with the stream.
    let reply = h.session.send_message("again", None).await.unwrap();
    assert_eq!(reply, "abcd");
}

#[tokio::test(start_paused = true)]
async fn stopped_stream_ends_without_recording_a_reply() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["", "a", "ab", "abc"]);
    h.session.initialize().await.unwrap();
    let events = h.record();

    let mut fragments = h.session.send_message_stream("hi", None);
    assert_eq!(fragments.next().await.unwrap().unwrap(), "a");
    fragments.stop();
    let after_stop = h.page.interactions();

    assert!(fragments.next().await.is_none());
    assert!(fragments.is_stopped());
    assert_eq!(h.page.interactions(), after_stop);
    assert!(!events.lock().contains(&EventKind::MessageReceived));
}

#[tokio::test(start_paused = true)]
async fn destroy_ends_an_open_stream() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["", "a", "ab", "abc"]);
    h.session.initialize().await.unwrap();

    let mut fragments = h.session.send_message_stream("hi", None);
    assert_eq!(fragments.next().await.unwrap().unwrap(), "a");
    h.session.destroy().await;

    assert!(fragments.next().await.is_none());
    assert!(h.page.is_closed());
}

#[tokio::test(start_paused = true)]
async fn stream_stopped_before_first_poll_sends_nothing() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["never read"]);
    h.session.initialize().await.unwrap();

    let fragments = h.session.send_message_stream("hi", None);
    fragments.stop();
    let err = fragments.collect_reply().await.unwrap_err();

    assert!(matches!(err, ChannelError::Cancelled { .. }), "{err}");
    assert!(h.page.navigations().is_empty());
    assert!(h.page.keys().is_empty());
    assert!(h.session.get_status().last_error.is_none());
}

#[tokio::test]
async fn send_after_destroy_is_a_lifecycle_error() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["never read"]);
    h.session.initialize().await.unwrap();
    h.session.destroy().await;

    let err = h.session.send_message("hi", None).await.unwrap_err();
    assert!(
        matches!(
            err,
            ChannelError::SessionLifecycle {
                state: Lifecycle::Destroyed,
                ..
            }
        ),
        "{err}"
    );

    let mut fragments = h.session.send_message_stream("hi", None);
    let first = fragments.next().await.expect("an item");
    assert!(
        matches!(
            first,
            Err(ChannelError::SessionLifecycle {
                state: Lifecycle::Destroyed,
                ..
            })
        ),
        "{first:?}"
    );
    assert!(fragments.next().await.is_none());

    let collected = h.session.send_message_stream("hi", None).collect_reply().await;
    assert!(
        matches!(
            collected,
            Err(ChannelError::SessionLifecycle {
                state: Lifecycle::Destroyed,
                ..
            })
        ),
        "{collected:?}"
    );
    assert!(h.page.navigations().is_empty());
    assert!(h.page.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_sends_run_one_after_another() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["", "one", "one two"]);
    h.session.initialize().await.unwrap();
    let events = h.record();

    let (first, second) = tokio::join!(
        h.session.send_message("a", None),
        h.session.send_message("b", None),
    );

    assert_eq!(first.unwrap(), "one two");
    assert_eq!(second.unwrap(), "one two");
    let flow: Vec<EventKind> = events
        .lock()
        .iter()
        .copied()
        .filter(|kind| matches!(kind, EventKind::MessageSent | EventKind::MessageReceived))
        .collect();
    assert_eq!(
        flow,
        vec![
            EventKind::MessageSent,
            EventKind::MessageReceived,
            EventKind::MessageSent,
            EventKind::MessageReceived,
        ]
    );
    assert_eq!(h.page.navigations(), vec![CHAT_URL, CHAT_URL]);
}

#[tokio::test(start_paused = true)]
async fn open_stream_holds_back_the_next_send() {
    let h = Harness::new(FakeAuth::logged_in());
    h.page.script_text(".reply", ["", "a", "ab", "abc"]);
    h.session.initialize().await.unwrap();

    let mut fragments = h.session.send_message_stream("hi", None);
    assert_eq!(fragments.next().await.unwrap().unwrap(), "a");

    let waiting = tokio::time::timeout(
        Duration::from_secs(60),
        h.session.send_message("again", None),
    )
    .await;
    assert!(waiting.is_err(), "send ran while the stream was open");
    assert_eq!(h.page.navigations(), vec![CHAT_URL]);
    assert_eq!(h.page.input_value(), "hi");

    let rest: Vec<String> = fragments.map(|item| item.unwrap()).collect().await;
    assert_eq!(rest, vec!["b", "c"]);
    assert_eq!(h.session.send_message("again", None).await.unwrap(), "abc");
    assert_eq!(h.page.navigations(), vec![CHAT_URL, CHAT_URL]);
}

#[tokio::test]
async fn operations_respect_lifecycle() {
    let h = Harness::new(FakeAuth::logged_in());

    assert!(!h.session.is_authenticated().await);
    let err = h.session.send_message("hi", None).await.unwrap_err();
    assert!(matches!(
        err,
        ChannelError::SessionLifecycle {
            state: Lifecycle::Created,
            ..
        }
    ));
    assert_eq!(h.auth.checks.load(Ordering::SeqCst), 0);

    h.session.initialize().await.unwrap();
    assert!(h.session.is_authenticated().await);
    assert!(h.session.get_status().authenticated);

    h.session.destroy().await;
    h.session.destroy().await;
    assert_eq!(h.provider.released(), 1);
    assert_eq!(h.session.get_status(), ChannelStatus::disconnected());
    assert!(!h.session.is_authenticated().await);
    assert!(matches!(
        h.session.initialize().await,
        Err(ChannelError::SessionLifecycle {
            state: Lifecycle::Destroyed,
            ..
        })
    ));
}

#[tokio::test]
async fn failed_initialization_leaves_session_unusable() {
    let auth = FakeAuth::logged_in();
    auth.fail_init.store(true, Ordering::SeqCst);
    let h = Harness::new(auth);

    assert!(h.session.initialize().await.is_err());
    assert_eq!(h.session.lifecycle(), Lifecycle::Created);
    assert_eq!(h.provider.released(), 1);
    assert!(!h.session.get_status().connected);
    assert!(h.session.send_message("hi", None).await.is_err());
}

#[tokio::test]
async fn status_changes_are_published() {
    let h = Harness::new(FakeAuth::logged_out());
    let events = h.record();

    h.session.initialize().await.unwrap();
    let result = h.session.authenticate().await.unwrap();
    assert!(result.success);
    h.session.logout().await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![
            EventKind::StatusChanged,
            EventKind::Connected,
            EventKind::StatusChanged,
            EventKind::Authenticated,
            EventKind::StatusChanged,
            EventKind::Unauthenticated,
        ]
    );
    assert!(!h.session.get_status().authenticated);
}

#[tokio::test]
async fn subscriptions_are_scoped_to_the_channel() {
    let h = Harness::new(FakeAuth::logged_in());
    let other = Harness::with_profile(profile("other"), FakeAuth::logged_in());
    let shared = channel_session::ChannelSession::new(
        profile("other"),
        other.provider.clone(),
        other.auth.clone(),
        h.hub.clone(),
        support::settings(),
    )
    .unwrap();

    let events = h.record();
    let connected = h.session.subscribe(EventKind::Connected, |_| {});
    shared.initialize().await.unwrap();
    assert!(events.lock().is_empty());

    h.session.initialize().await.unwrap();
    assert_eq!(events.lock().len(), 2);
    assert!(h.session.unsubscribe(connected));
    assert!(!h.session.unsubscribe(connected));
}
