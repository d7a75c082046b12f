//! Repository tests against a real database.
//!
//! Ignored by default: they need `DATABASE_URL` pointing at a PostgreSQL
//! server. Run with `cargo test -p gigs-db -- --ignored`.

use gigs_core::gig::{GigStatus, MessageRef, PostRef, PosterAsset};
use gigs_db::models::gig::CreateGig;
use gigs_db::repositories::gig_repo::{is_public_id_conflict, is_submission_key_conflict};
use gigs_db::repositories::{GigJobRepo, GigRepo, ModeratorRepo};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_gig(public_id: &str) -> CreateGig {
    CreateGig {
        public_id: public_id.to_string(),
        title: "Foo Bar".to_string(),
        date_ms: 1_769_126_400_000,
        end_date_ms: None,
        venue: "Loco Club".to_string(),
        city: "Valencia".to_string(),
        country: "ES".to_string(),
        tickets_url: "https://tickets.test/foo".to_string(),
        poster: None,
        suggested_by_user_id: Some(4242),
        submission_key: None,
    }
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn statuses_are_seeded(pool: PgPool) {
    gigs_db::health_check(&pool).await.unwrap();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM gig_statuses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 5);
}

// ---------------------------------------------------------------------------
// Gigs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn create_and_find(pool: PgPool) {
    let gig = GigRepo::create(&pool, &new_gig("foo-bar-2026-01-23")).await.unwrap();
    assert_eq!(gig.status(), GigStatus::New);
    assert!(gig.poster().is_none());

    let found = GigRepo::find_by_public_id(&pool, "foo-bar-2026-01-23")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, gig.id);
    assert!(GigRepo::public_id_exists(&pool, "foo-bar-2026-01-23").await.unwrap());
    assert!(!GigRepo::public_id_exists(&pool, "other").await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn duplicate_public_id_is_detected(pool: PgPool) {
    GigRepo::create(&pool, &new_gig("dup")).await.unwrap();
    let err = GigRepo::create(&pool, &new_gig("dup")).await.unwrap_err();
    assert!(is_public_id_conflict(&err));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn submission_key_is_unique(pool: PgPool) {
    let mut first = new_gig("keyed");
    first.submission_key = Some("abc123".into());
    let gig = GigRepo::create(&pool, &first).await.unwrap();

    let mut second = new_gig("keyed-2");
    second.submission_key = Some("abc123".into());
    let err = GigRepo::create(&pool, &second).await.unwrap_err();
    assert!(is_submission_key_conflict(&err));
    assert!(!is_public_id_conflict(&err));

    let found = GigRepo::find_by_submission_key(&pool, "abc123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, gig.id);

    // Gigs created outside the queue carry no key and never collide.
    GigRepo::create(&pool, &new_gig("plain-1")).await.unwrap();
    GigRepo::create(&pool, &new_gig("plain-2")).await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn poster_without_retrievable_form_is_refused(pool: PgPool) {
    let mut input = new_gig("url-only");
    input.poster = Some(PosterAsset {
        external_url: Some("https://cdn.test/p.jpg".into()),
        ..Default::default()
    });
    assert!(GigRepo::create(&pool, &input).await.is_err());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn compare_and_set_only_from_expected(pool: PgPool) {
    let gig = GigRepo::create(&pool, &new_gig("cas")).await.unwrap();

    let moved = GigRepo::compare_and_set_status(&pool, gig.id, GigStatus::New, GigStatus::Pending)
        .await
        .unwrap();
    assert_eq!(moved.unwrap().status(), GigStatus::Pending);

    let stale = GigRepo::compare_and_set_status(&pool, gig.id, GigStatus::New, GigStatus::Pending)
        .await
        .unwrap();
    assert!(stale.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn dedup_lookup_and_references(pool: PgPool) {
    let mut input = new_gig("with-poster");
    input.poster = Some(PosterAsset {
        bucket_path: Some("gigs/2026/es/valencia/with-poster.jpg".into()),
        external_url: Some("https://cdn.test/p.jpg".into()),
        file_id: None,
    });
    let gig = GigRepo::create(&pool, &input).await.unwrap();

    let hit = GigRepo::find_by_external_poster_url(&pool, "https://cdn.test/p.jpg")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.id, gig.id);

    let post = PostRef { message_id: 9, chat_id: -1001, file_id: Some("F".into()) };
    GigRepo::set_post(&pool, gig.id, &post).await.unwrap();
    let feedback = MessageRef { chat_id: 4242, message_id: 3 };
    GigRepo::set_feedback_message(&pool, gig.id, feedback).await.unwrap();
    GigRepo::set_poster_file_id(&pool, gig.id, "F").await.unwrap();

    let gig = GigRepo::find_by_id(&pool, gig.id).await.unwrap().unwrap();
    assert_eq!(gig.post(), Some(post));
    assert_eq!(gig.feedback_message(), Some(feedback));
    assert_eq!(gig.poster().unwrap().file_id.as_deref(), Some("F"));
}

// ---------------------------------------------------------------------------
// Moderators
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn moderator_activation(pool: PgPool) {
    ModeratorRepo::upsert(&pool, 10, Some("ana")).await.unwrap();
    ModeratorRepo::upsert(&pool, 20, None).await.unwrap();
    assert_eq!(ModeratorRepo::list_active_telegram_ids(&pool).await.unwrap(), vec![10, 20]);

    assert!(ModeratorRepo::deactivate(&pool, 10).await.unwrap());
    assert_eq!(ModeratorRepo::list_active_telegram_ids(&pool).await.unwrap(), vec![20]);
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn claim_ack_and_requeue(pool: PgPool) {
    let a = GigJobRepo::enqueue(&pool, "q", b"a").await.unwrap();
    let b = GigJobRepo::enqueue(&pool, "q", b"b").await.unwrap();

    let claimed = GigJobRepo::claim_batch(&pool, "q", "c1", 10).await.unwrap();
    assert_eq!(claimed.len(), 2);
    assert!(claimed.iter().all(|j| j.delivery_count == 1));

    // Nothing left to claim while both are held.
    assert!(GigJobRepo::claim_batch(&pool, "q", "c2", 10).await.unwrap().is_empty());

    assert!(GigJobRepo::ack(&pool, a.id).await.unwrap());
    assert!(GigJobRepo::requeue(&pool, b.id).await.unwrap());

    let again = GigJobRepo::claim_batch(&pool, "q", "c2", 10).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, b.id);
    assert_eq!(again[0].delivery_count, 2);
    assert_eq!(GigJobRepo::count(&pool, "q").await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn expired_claims_are_released(pool: PgPool) {
    GigJobRepo::enqueue(&pool, "q", b"x").await.unwrap();
    GigJobRepo::claim_batch(&pool, "q", "c1", 1).await.unwrap();
    sqlx::query("UPDATE gig_jobs SET claimed_at = NOW() - INTERVAL '1 hour'")
        .execute(&pool)
        .await
        .unwrap();

    assert_eq!(GigJobRepo::release_expired(&pool, "q", 300).await.unwrap(), 1);
    assert_eq!(GigJobRepo::claim_batch(&pool, "q", "c2", 1).await.unwrap().len(), 1);
}
