//! Inbound pipeline tests: the intake contract and a full SMTP session
//! against the receiver.

use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;

use courier::config::ReceiverConfig;
use courier::directory::{DirectoryError, RecipientDirectory, StaticDirectory};
use courier::smtp::{SmtpClient, SmtpReceiver};
use courier::store::MemoryStore;
use courier::{Envelope, Intake, IntakeError};

struct UnreachableDirectory;

#[async_trait]
impl RecipientDirectory for UnreachableDirectory {
    async fn exists(&self, _local_part: &str) -> Result<bool, DirectoryError> {
        Err(DirectoryError::Lookup("service unreachable".to_string()))
    }
}

fn intake_with(users: &[&str]) -> (Intake, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let intake = Intake::new(
        Arc::new(StaticDirectory::new(users.iter().copied())),
        store.clone(),
    );
    (intake, store)
}

const RAW: &[u8] = b"From: sender@origin.test\r\n\
Subject: greetings\r\n\
\r\n\
Hello there\r\n";

#[tokio::test]
async fn stores_one_record_per_accepted_recipient() {
    let (intake, store) = intake_with(&["alice", "bob"]);

    let envelope = Envelope {
        mail_from: "sender@origin.test".to_string(),
        rcpt_to: vec![
            "alice@local.test".to_string(),
            "ghost@local.test".to_string(),
            "bob@local.test".to_string(),
        ],
    };

    let receipt = intake.accept(&envelope, RAW).await.unwrap();

    assert!(receipt.is_partial());
    assert_eq!(receipt.rejected, vec!["ghost@local.test"]);
    assert_eq!(receipt.stored.len(), 2);
    assert_ne!(receipt.stored[0].id, receipt.stored[1].id);

    let records = store.records();
    assert_eq!(records.len(), 2);
    for (_, record) in &records {
        assert_eq!(record.sender, "sender@origin.test");
        assert_eq!(record.headers.get("subject"), Some("greetings"));
        assert_eq!(record.body, "Hello there");
    }
}

#[tokio::test]
async fn directory_outage_aborts_without_storing() {
    let store = Arc::new(MemoryStore::default());
    let intake = Intake::new(Arc::new(UnreachableDirectory), store.clone());

    let envelope = Envelope {
        mail_from: "sender@origin.test".to_string(),
        rcpt_to: vec!["alice@local.test".to_string()],
    };

    let err = intake.accept(&envelope, RAW).await.unwrap_err();
    assert!(matches!(err, IntakeError::Directory(_)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn all_recipients_rejected_is_an_error() {
    let (intake, store) = intake_with(&["alice"]);

    let envelope = Envelope {
        mail_from: "sender@origin.test".to_string(),
        rcpt_to: vec!["ghost@local.test".to_string()],
    };

    let err = intake.accept(&envelope, RAW).await.unwrap_err();
    assert!(matches!(err, IntakeError::NoValidRecipients));
    assert!(store.is_empty());
}

async fn start_receiver(users: &[&str]) -> (std::net::SocketAddr, Arc<MemoryStore>) {
    let (intake, store) = intake_with(users);
    let receiver = SmtpReceiver::new(ReceiverConfig::default(), intake);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = receiver.serve(listener).await;
    });

    (addr, store)
}

#[tokio::test]
async fn full_session_stores_the_message() {
    let (addr, store) = start_receiver(&["alice"]).await;

    let mut client = SmtpClient::connect(&addr.to_string()).await.unwrap();
    assert!(client.read_greeting().await.unwrap().is_success());
    assert!(client.helo("client.test").await.unwrap().is_success());
    assert!(client
        .mail_from("sender@origin.test")
        .await
        .unwrap()
        .is_success());
    assert!(client
        .rcpt_to("alice@local.test")
        .await
        .unwrap()
        .is_success());
    assert!(client.data().await.unwrap().is_intermediate());

    let payload = "Subject: over the wire\r\n\r\n.leading dot line";
    assert!(client.send_data(payload).await.unwrap().is_success());
    assert!(client.quit().await.unwrap().is_success());

    let records = store.records();
    assert_eq!(records.len(), 1);
    let record = &records[0].1;
    assert_eq!(record.recipient, "alice@local.test");
    assert_eq!(record.headers.get("subject"), Some("over the wire"));
    // Dot-stuffing reversed by the receiver.
    assert_eq!(record.body, ".leading dot line");
}

#[tokio::test]
async fn unknown_recipient_is_refused_at_rcpt_time() {
    let (addr, store) = start_receiver(&["alice"]).await;

    let mut client = SmtpClient::connect(&addr.to_string()).await.unwrap();
    client.read_greeting().await.unwrap();
    client.helo("client.test").await.unwrap();
    client.mail_from("sender@origin.test").await.unwrap();

    let refused = client.rcpt_to("ghost@local.test").await.unwrap();
    assert_eq!(refused.code, 550);

    let accepted = client.rcpt_to("alice@local.test").await.unwrap();
    assert!(accepted.is_success());

    client.quit().await.unwrap();
    assert!(store.is_empty());
}

#[tokio::test]
async fn data_without_recipients_is_rejected() {
    let (addr, _store) = start_receiver(&["alice"]).await;

    let mut client = SmtpClient::connect(&addr.to_string()).await.unwrap();
    client.read_greeting().await.unwrap();
    client.helo("client.test").await.unwrap();
    client.mail_from("sender@origin.test").await.unwrap();

    let response = client.data().await.unwrap();
    assert_eq!(response.code, 503);
}
