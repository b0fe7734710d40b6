#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

mod common;

use relay_bot::bot::{Config, ConnectionState};
use relay_bot::error::{Kind, NotConnected, UnknownRecipient};
use relay_bot::transport::CloseReason;

use crate::common::{Harness, RECIPIENT, RECIPIENT_ID, settle};

#[tokio::test(start_paused = true)]
async fn send_before_start_should_fail_not_connected() {
    let harness = Harness::new(Config::default());

    let err = harness
        .bot
        .send_message(RECIPIENT, "hola")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::NotConnected);
    assert_eq!(
        err.downcast_ref::<NotConnected>().unwrap().state,
        ConnectionState::Idle
    );
    assert_eq!(harness.transport.connects(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_while_connecting_should_not_touch_session() {
    let harness = Harness::new(Config::default());
    harness.bot.start().await;
    let session = harness.transport.latest();

    let err = harness
        .bot
        .send_message(RECIPIENT, "hola")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::NotConnected);
    assert!(session.session.probed().is_empty());
    assert!(session.session.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_after_close_should_fail_not_connected() {
    let harness = Harness::new(Config::default());
    let session = harness.open().await;
    session.close(CloseReason::Transient);
    settle().await;

    let err = harness
        .bot
        .send_message("5551234", "hi")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::NotConnected);
    assert!(session.session.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_on_unready_socket_should_fail_not_connected() {
    let harness = Harness::new(Config::default());
    let session = harness.open().await;
    session.session.set_ready(false);

    let err = harness
        .bot
        .send_message(RECIPIENT, "hola")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::NotConnected);
    assert!(session.session.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_should_normalize_identity_and_probe_first() -> anyhow::Result<()> {
    let harness = Harness::new(Config::default());
    let session = harness.open().await;

    harness.bot.send_message("555-123-4567", "hola").await?;

    assert_eq!(session.session.probed(), vec![RECIPIENT_ID.to_owned()]);
    assert_eq!(
        session.session.sent(),
        vec![(RECIPIENT_ID.to_owned(), "hola".to_owned())]
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_to_unknown_recipient_should_fail_without_sending() {
    let harness = Harness::new(Config::default());
    let session = harness.open().await;
    session.session.set_known_recipients(false);

    let err = harness
        .bot
        .send_message(RECIPIENT, "hola")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::UnknownRecipient);
    assert_eq!(
        err.downcast_ref::<UnknownRecipient>().unwrap().identity,
        RECIPIENT_ID
    );
    assert!(session.session.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn send_without_probing_should_skip_lookup() -> anyhow::Result<()> {
    let harness = Harness::new(Config::builder().probe_recipients(false).build());
    let session = harness.open().await;
    session.session.set_known_recipients(false);

    harness.bot.send_message(RECIPIENT, "hola").await?;

    assert!(session.session.probed().is_empty());
    assert_eq!(session.session.sent().len(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn transport_failure_should_surface_and_keep_session_open() {
    let harness = Harness::new(Config::default());
    let session = harness.open().await;
    session.session.set_fail_sends(true);

    let err = harness
        .bot
        .send_message(RECIPIENT, "hola")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Kind::Transport);
    assert!(harness.bot.state().is_open());
    assert_eq!(harness.transport.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn full_identity_should_be_used_verbatim() -> anyhow::Result<()> {
    let harness = Harness::new(Config::default());
    let session = harness.open().await;

    harness
        .bot
        .send_message("120363000000000000@g.us", "hola grupo")
        .await?;

    assert_eq!(
        session.session.sent(),
        vec![("120363000000000000@g.us".to_owned(), "hola grupo".to_owned())]
    );

    Ok(())
}
