//! Message Store Integration Tests
//!
//! Relay records on disk, through the Slack client.

mod common;

use common::FakeSlack;
use slack_timeline::{Message, MessageRepository, MessageStore, RelayLedger, User};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

fn create_test_store(slack: &std::sync::Arc<FakeSlack>, dir: &TempDir) -> MessageStore {
    let ledger = RelayLedger::open(&dir.path().join("data").join("relay.db"))
        .expect("Failed to open ledger");
    MessageStore::new("CTIMELINE", slack.client(), ledger)
}

fn dark() -> User {
    User::new("U1", "dark", "https://img/u1.png")
}

#[tokio::test]
async fn test_post_parameters() {
    let temp = TempDir::new().unwrap();
    let slack = FakeSlack::new();
    let store = create_test_store(&slack, &temp);

    store
        .put(&dark(), &Message::new("hello", "U1", "C1", "1.0"))
        .await
        .unwrap();

    let posts = slack.calls("chat.postMessage");
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].get("channel"), Some("CTIMELINE"));
    assert_eq!(posts[0].get("text"), Some("hello (at <#C1> )"));
    assert_eq!(posts[0].get("username"), Some("dark"));
    assert_eq!(posts[0].get("icon_url"), Some("https://img/u1.png"));
    assert_eq!(posts[0].get("as_user"), Some("false"));
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let slack = FakeSlack::new();
    let message = Message::new("hello", "U1", "C1", "1.0");

    {
        let store = create_test_store(&slack, &temp);
        store.put(&dark(), &message).await.unwrap();
    }

    // Restarted process: no second post, copy still addressable
    let store = create_test_store(&slack, &temp);
    assert!(store.exists("C1-1.0").unwrap());

    store.put(&dark(), &message).await.unwrap();
    assert_eq!(slack.calls("chat.postMessage").len(), 1);

    let relayed = store.find_in_timeline(&message).unwrap();
    assert_eq!(relayed.message.channel_id, "CTIMELINE");
    assert_eq!(relayed.message.timestamp, "1700000000.000001");

    assert_ok!(store.delete(&relayed).await);
    let deletes = slack.calls("chat.delete");
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].get("ts"), Some("1700000000.000001"));
    assert_eq!(deletes[0].get("channel"), Some("CTIMELINE"));
    assert_eq!(store.ledger().count().unwrap(), 0);
}

#[tokio::test]
async fn test_rate_limited_post_is_retried() {
    let temp = TempDir::new().unwrap();
    let slack = FakeSlack::new();
    slack
        .rate_limited_posts
        .store(2, std::sync::atomic::Ordering::SeqCst);
    let store = create_test_store(&slack, &temp);

    store
        .put(&dark(), &Message::new("hello", "U1", "C1", "1.0"))
        .await
        .unwrap();

    assert_eq!(slack.calls("chat.postMessage").len(), 3);
    assert!(store.exists("C1-1.0").unwrap());
}

#[tokio::test]
async fn test_exhausted_post_records_nothing() {
    let temp = TempDir::new().unwrap();
    let slack = FakeSlack::new();
    slack
        .rate_limited_posts
        .store(5, std::sync::atomic::Ordering::SeqCst);
    let store = create_test_store(&slack, &temp);

    let err = assert_err!(
        store
            .put(&dark(), &Message::new("hello", "U1", "C1", "1.0"))
            .await
    );

    assert!(err.is_fatal());
    assert_eq!(slack.calls("chat.postMessage").len(), 3);
    assert!(!store.exists("C1-1.0").unwrap());
}
