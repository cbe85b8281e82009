//! End-to-end tests for the mailbox-to-ticket pipeline against a scripted mailbox.

mod common;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use common::{
    binary_junk_message, simple_message, unreadable_message, FakeTransport, MessageBuilder,
    TestHarness,
};
use helpedge::db::ticket_repo;
use helpedge::email::{MailError, UNKNOWN_SENDER};
use helpedge::ingest::{IngestError, IngestOptions, MessageStage};
use helpedge::model::is_valid_ticket_number;
use helpedge::{TicketPriority, TicketSource, TicketStatus};

#[tokio::test]
async fn test_empty_mailbox_creates_nothing() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::new();

    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(report.unseen, 0);
    assert_eq!(report.tickets_created(), 0);
    assert!(report.is_clean());
    assert_eq!(harness.ticket_count(), 0);
    assert_eq!(transport.close_calls, 1);
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_printer_broken_end_to_end() {
    let harness = TestHarness::new();
    let raw = MessageBuilder::new()
        .from("alice@example.com")
        .subject("Printer broken")
        .body("The printer on floor 3 is jammed.")
        .message_id("printer-1@example.com")
        .build();
    let mut transport = FakeTransport::with_messages([raw]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    assert_eq!(report.created, vec!["TKT-000001".to_string()]);

    let ticket = harness.ticket("TKT-000001");
    assert_eq!(ticket.title, "Printer broken");
    assert_eq!(ticket.description, "The printer on floor 3 is jammed.");
    assert_eq!(ticket.customer_email, "alice@example.com");
    assert_eq!(ticket.customer_name, None);
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.priority, TicketPriority::Medium);
    assert_eq!(ticket.source, TicketSource::Email);
    assert_eq!(ticket.created_by, "system");
    assert_eq!(ticket.message_id.as_deref(), Some("printer-1@example.com"));

    let category = helpedge::db::category_repo::find_by_id(&harness.db, &ticket.category_id)
        .unwrap()
        .unwrap();
    assert_eq!(category.name, "General");

    assert!(transport.is_seen(1));
    assert_eq!(transport.close_calls, 1);
}

#[tokio::test]
async fn test_every_message_becomes_one_open_ticket() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages(
        (1..=3).map(|i| simple_message(&format!("Issue {}", i), "details")),
    );

    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(report.unseen, 3);
    assert_eq!(
        report.created,
        vec!["TKT-000001", "TKT-000002", "TKT-000003"]
    );
    for number in &report.created {
        assert!(is_valid_ticket_number(number));
        let ticket = harness.ticket(number);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert_eq!(ticket.source, TicketSource::Email);
    }
    assert_eq!(transport.unseen_count(), 0);
    assert_eq!(harness.general_category_rows(), 1);
}

#[tokio::test]
async fn test_one_malformed_among_five() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([
        simple_message("One", "a"),
        simple_message("Two", "b"),
        unreadable_message(),
        simple_message("Four", "d"),
        simple_message("Five", "e"),
    ]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(report.tickets_created(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, 3);
    assert_eq!(report.failures[0].stage, MessageStage::Parse);
    assert_eq!(harness.ticket_count(), 4);

    // The bad message stays unread for the next run.
    assert!(!transport.is_seen(3));
    assert_eq!(transport.unseen_count(), 1);
}

#[tokio::test]
async fn test_binary_junk_is_a_parse_failure() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([
        simple_message("Before", "a"),
        binary_junk_message(),
        simple_message("After", "c"),
    ]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(report.created, vec!["TKT-000001", "TKT-000002"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, 2);
    assert_eq!(report.failures[0].stage, MessageStage::Parse);
    assert!(report.failures[0].error.contains("no header block"));
    assert_eq!(harness.ticket_count(), 2);
    assert!(!transport.is_seen(2));
}

#[tokio::test]
async fn test_missing_subject_and_sender_use_placeholders() {
    let harness = TestHarness::new();
    let raw = MessageBuilder::new().no_subject().no_from().body("?").build();
    let mut transport = FakeTransport::with_messages([raw]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    let ticket = harness.ticket(&report.created[0]);

    assert_eq!(ticket.title, "(No Subject)");
    assert_eq!(ticket.customer_email, UNKNOWN_SENDER);
    assert_eq!(ticket.customer_name, None);
}

#[tokio::test]
async fn test_display_name_and_address_are_normalised() {
    let harness = TestHarness::new();
    let raw = MessageBuilder::new()
        .from("Bob Jones <Bob.Jones@Example.COM>")
        .build();
    let mut transport = FakeTransport::with_messages([raw]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    let ticket = harness.ticket(&report.created[0]);

    assert_eq!(ticket.customer_email, "bob.jones@example.com");
    assert_eq!(ticket.customer_name.as_deref(), Some("Bob Jones"));
}

#[tokio::test]
async fn test_long_body_is_truncated_to_5000_chars() {
    let harness = TestHarness::new();
    let body = "a".repeat(7000);
    let mut transport = FakeTransport::with_messages([simple_message("Long", &body)]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    let ticket = harness.ticket(&report.created[0]);

    assert_eq!(ticket.description.chars().count(), 5000);
}

#[tokio::test]
async fn test_html_only_message_becomes_text() {
    let harness = TestHarness::new();
    let raw = MessageBuilder::new()
        .html()
        .body("<html><body><p>VPN is down</p></body></html>")
        .build();
    let mut transport = FakeTransport::with_messages([raw]);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    let ticket = harness.ticket(&report.created[0]);

    assert!(ticket.description.contains("VPN is down"));
    assert!(!ticket.description.contains("<p>"));
}

#[tokio::test]
async fn test_connect_failure_fails_run_and_still_closes() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([simple_message("x", "y")]);
    transport.fail_connect = true;

    let err = harness.orchestrator().run(&mut transport).await.unwrap_err();

    assert!(matches!(err, IngestError::Connection(_)));
    assert_eq!(transport.close_calls, 1);
    assert_eq!(transport.fetch_calls, 0);
    assert_eq!(harness.ticket_count(), 0);
}

#[tokio::test]
async fn test_mailbox_failure_fails_run() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([simple_message("x", "y")]);
    transport.fail_select = true;

    let err = harness.orchestrator().run(&mut transport).await.unwrap_err();

    assert!(matches!(err, IngestError::Mailbox(_)));
    assert_eq!(transport.close_calls, 1);
    assert_eq!(harness.ticket_count(), 0);
}

#[tokio::test]
async fn test_enumeration_failure_fails_run() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([simple_message("x", "y")]);
    transport.fail_list = true;

    let err = harness.orchestrator().run(&mut transport).await.unwrap_err();

    assert!(matches!(err, IngestError::Enumerate(_)));
    assert_eq!(transport.close_calls, 1);
}

#[tokio::test]
async fn test_fetch_failure_skips_only_that_message() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([
        simple_message("One", "a"),
        simple_message("Two", "b"),
        simple_message("Three", "c"),
    ]);
    transport.fail_fetch.insert(2);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(report.tickets_created(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, MessageStage::Fetch);
    assert!(!transport.is_seen(2));
    assert!(transport.is_seen(1));
    assert!(transport.is_seen(3));
}

#[tokio::test]
async fn test_fetch_timeout_ends_run_on_that_session() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([
        simple_message("One", "a"),
        simple_message("Two", "b"),
        simple_message("Three", "c"),
    ]);
    transport.timeout_fetch.insert(1);

    let err = harness.orchestrator().run(&mut transport).await.unwrap_err();

    match err {
        IngestError::SessionLost { id, stage, source } => {
            assert_eq!(id.0, 1);
            assert_eq!(stage, MessageStage::Fetch);
            assert!(matches!(source, MailError::Timeout { operation: "fetch", .. }));
        }
        other => panic!("expected SessionLost, got {:?}", other),
    }
    // No command goes out on the desynchronised session.
    assert_eq!(transport.fetch_calls, 1);
    assert_eq!(transport.mark_seen_calls, 0);
    assert_eq!(transport.close_calls, 1);
    assert!(!transport.is_connected());
    assert_eq!(harness.ticket_count(), 0);
    assert_eq!(transport.unseen_count(), 3);
}

#[tokio::test]
async fn test_store_timeout_ends_run_after_ticket_exists() {
    let harness = TestHarness::new();
    let mut transport =
        FakeTransport::with_messages([simple_message("One", "a"), simple_message("Two", "b")]);
    transport.timeout_mark_seen.insert(1);

    let err = harness.orchestrator().run(&mut transport).await.unwrap_err();

    assert!(matches!(
        err,
        IngestError::SessionLost {
            stage: MessageStage::Acknowledge,
            ..
        }
    ));
    assert_eq!(transport.fetch_calls, 1);
    assert_eq!(transport.close_calls, 1);
    // The ticket stays; the message is fetched again next run.
    assert_eq!(harness.ticket_count(), 1);
    assert!(!transport.is_seen(1));

    transport.timeout_mark_seen.clear();
    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    assert_eq!(report.tickets_created(), 2);
    assert_eq!(transport.unseen_count(), 0);
}

#[tokio::test]
async fn test_flag_failure_keeps_ticket_and_message_unread() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([simple_message("Sticky", "body")]);
    transport.fail_mark_seen.insert(1);

    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(report.tickets_created(), 1);
    assert_eq!(report.ack_failures, 1);
    assert!(report.failures.is_empty());
    assert!(!report.is_clean());
    assert!(!transport.is_seen(1));
    assert_eq!(harness.ticket_count(), 1);
}

#[tokio::test]
async fn test_unacknowledged_message_is_reprocessed_by_default() {
    let harness = TestHarness::new();
    let raw = MessageBuilder::new().message_id("again@example.com").build();
    let mut transport = FakeTransport::with_messages([raw]);
    transport.fail_mark_seen.insert(1);

    harness.orchestrator().run(&mut transport).await.unwrap();
    transport.fail_mark_seen.clear();
    let second = harness.orchestrator().run(&mut transport).await.unwrap();

    assert_eq!(second.created, vec!["TKT-000002".to_string()]);
    assert_eq!(harness.ticket_count(), 2);
    assert!(transport.is_seen(1));
}

#[tokio::test]
async fn test_dedupe_by_message_id_acknowledges_without_new_ticket() {
    let harness = TestHarness::new();
    let raw = MessageBuilder::new().message_id("again@example.com").build();
    let mut transport = FakeTransport::with_messages([raw]);
    transport.fail_mark_seen.insert(1);

    let orchestrator = harness.orchestrator_with(IngestOptions {
        dedupe_by_message_id: true,
        ..TestHarness::options()
    });

    let first = orchestrator.run(&mut transport).await.unwrap();
    assert_eq!(first.tickets_created(), 1);

    transport.fail_mark_seen.clear();
    let second = orchestrator.run(&mut transport).await.unwrap();

    assert_eq!(second.tickets_created(), 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(harness.ticket_count(), 1);
    assert!(transport.is_seen(1));
    assert!(ticket_repo::find_by_message_id(&harness.db, "again@example.com")
        .unwrap()
        .is_some());
}

#[tokio::test(start_paused = true)]
async fn test_run_budget_abandons_remaining_messages() {
    let harness = TestHarness::new();
    let mut transport =
        FakeTransport::with_messages((1..=5).map(|i| simple_message(&format!("Slow {}", i), "")));
    transport.fetch_delay = Some(Duration::from_millis(100));

    let orchestrator = harness.orchestrator_with(IngestOptions {
        max_run_duration: Duration::from_millis(250),
        ..TestHarness::options()
    });
    let err = orchestrator.run(&mut transport).await.unwrap_err();

    match err {
        IngestError::RunTimeout {
            budget,
            tickets_created,
        } => {
            assert_eq!(budget, Duration::from_millis(250));
            assert_eq!(tickets_created, 2);
        }
        other => panic!("expected RunTimeout, got {:?}", other),
    }
    assert_eq!(transport.close_calls, 1);
    assert!(!transport.is_connected());
    assert_eq!(harness.ticket_count(), 2);
    assert_eq!(transport.unseen_count(), 3);
}

#[tokio::test]
async fn test_locked_store_is_bounded_by_busy_timeout() {
    let harness = TestHarness::with_busy_timeout(Duration::from_millis(100));
    let other = harness.second_connection();
    other
        .with_conn(|conn| Ok(conn.execute_batch("BEGIN IMMEDIATE;")?))
        .unwrap();

    let mut transport = FakeTransport::with_messages([simple_message("Locked", "out")]);
    let started = Instant::now();
    let report = harness.orchestrator().run(&mut transport).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(report.tickets_created(), 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, MessageStage::ResolveCategory);
    assert!(!transport.is_seen(1));
    assert_eq!(transport.close_calls, 1);

    other
        .with_conn(|conn| Ok(conn.execute_batch("COMMIT;")?))
        .unwrap();
    let report = harness.orchestrator().run(&mut transport).await.unwrap();
    assert_eq!(report.tickets_created(), 1);
}

#[tokio::test]
async fn test_panic_is_contained_and_connection_closed() {
    let harness = TestHarness::new();
    let mut transport = FakeTransport::with_messages([simple_message("x", "y")]);
    transport.panic_on_fetch = true;

    let err = harness.orchestrator().run(&mut transport).await.unwrap_err();

    assert!(matches!(err, IngestError::Panicked(ref msg) if msg == "fetch exploded"));
    assert_eq!(transport.close_calls, 1);
    assert_eq!(harness.ticket_count(), 0);
}

#[tokio::test]
async fn test_numbers_continue_across_runs() {
    let harness = TestHarness::new();
    let orchestrator = harness.orchestrator();

    let mut first = FakeTransport::with_messages([simple_message("a", ""), simple_message("b", "")]);
    orchestrator.run(&mut first).await.unwrap();

    let mut second = FakeTransport::with_messages([simple_message("c", "")]);
    let report = orchestrator.run(&mut second).await.unwrap();

    assert_eq!(report.created, vec!["TKT-000003".to_string()]);
    assert_eq!(harness.general_category_rows(), 1);
}

#[tokio::test]
async fn test_overlapping_runs_never_share_a_number() {
    let harness = TestHarness::new();
    let first = harness.orchestrator();
    let second = helpedge::ingest::IngestOrchestrator::new(
        harness.second_connection(),
        TestHarness::options(),
    );

    let mut a = FakeTransport::with_messages((0..10).map(|i| simple_message(&format!("a{}", i), "")));
    let mut b = FakeTransport::with_messages((0..10).map(|i| simple_message(&format!("b{}", i), "")));

    let (ra, rb) = tokio::join!(first.run(&mut a), second.run(&mut b));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    let numbers: HashSet<&String> = ra.created.iter().chain(rb.created.iter()).collect();
    assert_eq!(numbers.len(), 20);
    assert_eq!(harness.ticket_count(), 20);
    assert_eq!(harness.general_category_rows(), 1);
}
