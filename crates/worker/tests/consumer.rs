use std::sync::Arc;
use std::time::Duration;

use gigs_core::gig::GigStatus;
use gigs_core::job::{CreateGigJob, JobGig, JobMeta};
use gigs_pipeline::testing::{fields, Harness, RecordingPlatform, MODERATION_CHAT};
use gigs_worker::{DeliveryOutcome, GigJobConsumer, JobQueue, MemoryQueue, QueueConnection};

fn job(title: &str) -> Vec<u8> {
    CreateGigJob {
        gig: JobGig {
            fields: fields(title, "2026-01-23"),
            poster: None,
        },
        ..Default::default()
    }
    .to_bytes()
    .unwrap()
}

fn consumer(harness: &Harness, queue: Arc<MemoryQueue>) -> GigJobConsumer {
    GigJobConsumer::new(
        Arc::new(QueueConnection::fixed(queue)),
        harness.services.submissions.clone(),
        10,
        Duration::from_millis(10),
    )
}

#[tokio::test]
async fn queued_job_becomes_a_pending_gig() {
    let harness = Harness::new();
    let queue = Arc::new(MemoryQueue::new());
    queue.publish(&job("Foo Bar")).await.unwrap();

    assert_eq!(consumer(&harness, queue.clone()).run_once().await.unwrap(), 1);

    let gigs = harness.store.all();
    assert_eq!(gigs.len(), 1);
    assert_eq!(gigs[0].public_id, "foo-bar-2026-01-23");
    assert_eq!(gigs[0].status(), GigStatus::Pending);
    assert_eq!(queue.ack_count(), 1);
}

#[tokio::test]
async fn malformed_message_is_acked_once_and_never_redelivered() {
    let harness = Harness::new();
    let queue = Arc::new(MemoryQueue::new());
    queue.publish(b"not json at all").await.unwrap();
    let consumer = consumer(&harness, queue.clone());

    let delivery = queue.fetch(1).await.unwrap().remove(0);
    let outcome = consumer
        .process_delivery(queue.as_ref(), &delivery)
        .await
        .unwrap();

    assert_eq!(outcome, DeliveryOutcome::Dropped);
    assert_eq!(queue.ack_count(), 1);
    assert_eq!(queue.requeue_count(), 0);
    assert!(queue.fetch(10).await.unwrap().is_empty());
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn handler_failure_requeues_and_the_message_comes_back() {
    let harness = Harness::with_platform(RecordingPlatform::new().block_chat(MODERATION_CHAT));
    let queue = Arc::new(MemoryQueue::new());
    let id = queue.publish(&job("Foo Bar")).await.unwrap();
    let consumer = consumer(&harness, queue.clone());

    let first = queue.fetch(1).await.unwrap().remove(0);
    let outcome = consumer
        .process_delivery(queue.as_ref(), &first)
        .await
        .unwrap();
    assert_eq!(outcome, DeliveryOutcome::Requeued);
    assert_eq!(queue.ack_count(), 0);

    let again = queue.fetch(1).await.unwrap().remove(0);
    assert_eq!(again.id, id);
    assert_eq!(again.payload, first.payload);
    assert_eq!(again.delivery_count, 2);

    // The gig was saved before the send failed and stays New.
    let gigs = harness.store.all();
    assert_eq!(gigs[0].status(), GigStatus::New);
}

#[tokio::test]
async fn redelivered_job_creates_exactly_one_gig() {
    let harness = Harness::with_platform(RecordingPlatform::new().block_chat(MODERATION_CHAT));
    let queue = Arc::new(MemoryQueue::new());
    queue.publish(&job("Foo Bar")).await.unwrap();
    let consumer = consumer(&harness, queue.clone());

    for attempt in 1..=4 {
        let delivery = queue.fetch(1).await.unwrap().remove(0);
        assert_eq!(delivery.delivery_count, attempt);
        let outcome = consumer
            .process_delivery(queue.as_ref(), &delivery)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Requeued);
    }
    let gigs = harness.store.all();
    assert_eq!(gigs.len(), 1);
    assert_eq!(gigs[0].public_id, "foo-bar-2026-01-23");
    assert_eq!(gigs[0].status(), GigStatus::New);

    harness.platform.unblock_chat(MODERATION_CHAT);
    assert_eq!(consumer.run_once().await.unwrap(), 1);

    let gigs = harness.store.all();
    assert_eq!(gigs.len(), 1);
    assert_eq!(gigs[0].status(), GigStatus::Pending);
    assert_eq!(queue.ack_count(), 1);
    assert_eq!(queue.ready_len(), 0);
}

#[tokio::test]
async fn separately_published_copies_of_a_gig_are_not_merged() {
    let harness = Harness::new();
    let queue = Arc::new(MemoryQueue::new());
    for minute in ["10:00", "10:01"] {
        let mut job = CreateGigJob {
            gig: JobGig {
                fields: fields("Foo Bar", "2026-01-23"),
                poster: None,
            },
            ..Default::default()
        };
        job.meta = Some(JobMeta {
            enqueued_at: Some(format!("2026-01-01T{minute}:00Z").parse().unwrap()),
        });
        queue.publish(&job.to_bytes().unwrap()).await.unwrap();
    }

    consumer(&harness, queue.clone()).run_once().await.unwrap();

    let mut ids: Vec<_> = harness.store.all().into_iter().map(|g| g.public_id).collect();
    ids.sort();
    assert_eq!(ids, ["foo-bar-2026-01-23", "foo-bar-2026-01-23-2"]);
}

#[tokio::test]
async fn invalid_job_is_dropped() {
    let harness = Harness::new();
    let queue = Arc::new(MemoryQueue::new());
    queue
        .publish(br#"{"gig":{"title":"Foo","date":"yesterday"}}"#)
        .await
        .unwrap();

    consumer(&harness, queue.clone()).run_once().await.unwrap();

    assert_eq!(queue.ack_count(), 1);
    assert_eq!(queue.requeue_count(), 0);
    assert!(harness.store.is_empty());
}
