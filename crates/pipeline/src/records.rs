//! Gig records: public id allocation, creation and guarded transitions.
//!
//! Every status write goes through [`GigRecords::transition`], which checks
//! the adjacency table in `gigs_core::gig` and then applies a
//! compare-and-swap on the expected current status. A transition whose
//! target is already the current status is reported as
//! [`TransitionOutcome::AlreadyInState`] so duplicate callback deliveries
//! never repeat side effects.

use std::sync::Arc;

use gigs_core::error::CoreError;
use gigs_core::gig::{
    parse_gig_id, validate_transition, GigDraft, GigStatus, MessageRef, PostRef, PosterAsset,
};
use gigs_core::public_id::{base_public_id, candidates, random_candidate};
use gigs_core::types::{ChatId, DbId, EpochMillis};
use gigs_db::models::gig::{CreateGig, Gig};

use crate::error::PipelineError;
use crate::store::{GigStore, StoreError};

/// Inserts retried after losing a public id race.
const MAX_INSERT_ATTEMPTS: u32 = 3;

/// Input for [`GigRecords::save`].
#[derive(Debug, Clone)]
pub struct NewGig {
    pub draft: GigDraft,
    pub public_id: String,
    pub poster: Option<PosterAsset>,
    pub suggested_by_user_id: Option<ChatId>,
    /// Set for gigs created from a queued job.
    pub submission_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The status changed; carries the updated record.
    Applied(Gig),
    /// The gig was already in the target status; nothing was written.
    AlreadyInState(Gig),
}

impl TransitionOutcome {
    pub fn gig(&self) -> &Gig {
        match self {
            Self::Applied(gig) | Self::AlreadyInState(gig) => gig,
        }
    }

    pub fn into_gig(self) -> Gig {
        match self {
            Self::Applied(gig) | Self::AlreadyInState(gig) => gig,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Gig record operations over a [`GigStore`].
#[derive(Clone)]
pub struct GigRecords {
    store: Arc<dyn GigStore>,
}

impl GigRecords {
    pub fn new(store: Arc<dyn GigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GigStore> {
        &self.store
    }

    /// First free candidate for `title` and `date_ms`, falling back to a
    /// random suffix once the numbered candidates are exhausted.
    ///
    /// Best effort only: the unique constraint decides, and [`Self::save`]
    /// retries when it loses the race.
    pub async fn generate_unique_public_id(
        &self,
        title: &str,
        date_ms: EpochMillis,
    ) -> Result<String, PipelineError> {
        let base = base_public_id(title, date_ms);
        for candidate in candidates(&base) {
            if !self.store.public_id_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        tracing::warn!(base = %base, "Public id candidates exhausted, using random suffix");
        Ok(random_candidate(&base))
    }

    /// Persist a new gig in status `New`.
    ///
    /// A gig already stored under the same submission key is returned as is.
    pub async fn save(&self, input: NewGig) -> Result<Gig, PipelineError> {
        if let Some(poster) = &input.poster {
            poster.validate()?;
        }

        let NewGig {
            draft,
            mut public_id,
            poster,
            suggested_by_user_id,
            submission_key,
        } = input;

        let mut attempt = 1;
        loop {
            let create = CreateGig {
                public_id: public_id.clone(),
                title: draft.title.clone(),
                date_ms: draft.date_ms,
                end_date_ms: draft.end_date_ms,
                venue: draft.venue.clone(),
                city: draft.city.clone(),
                country: draft.country.clone(),
                tickets_url: draft.tickets_url.clone(),
                poster: poster.clone(),
                suggested_by_user_id,
                submission_key: submission_key.clone(),
            };

            match self.store.insert(&create).await {
                Ok(gig) => {
                    tracing::info!(gig_id = gig.id, public_id = %gig.public_id, "Gig created");
                    return Ok(gig);
                }
                Err(StoreError::PublicIdTaken(taken)) if attempt < MAX_INSERT_ATTEMPTS => {
                    tracing::warn!(public_id = %taken, attempt, "Public id taken, regenerating");
                    public_id = self
                        .generate_unique_public_id(&draft.title, draft.date_ms)
                        .await?;
                    attempt += 1;
                }
                Err(StoreError::SubmissionKeyTaken(key)) => {
                    tracing::info!(submission_key = %key, "Submission already stored");
                    return self.find_by_submission_key(&key).await?.ok_or_else(|| {
                        CoreError::Conflict(format!("Submission '{key}' collided but is not readable"))
                            .into()
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn find_by_submission_key(&self, key: &str) -> Result<Option<Gig>, PipelineError> {
        Ok(self.store.find_by_submission_key(key).await?)
    }

    pub async fn find(&self, id: DbId) -> Result<Gig, PipelineError> {
        self.store
            .find(id)
            .await?
            .ok_or(PipelineError::Core(CoreError::NotFound { entity: "Gig", id }))
    }

    /// Move a gig to `target`, refusing transitions outside the table.
    pub async fn transition(
        &self,
        id: DbId,
        target: GigStatus,
    ) -> Result<TransitionOutcome, PipelineError> {
        let gig = self.find(id).await?;
        let current = gig.status();
        if current == target {
            return Ok(TransitionOutcome::AlreadyInState(gig));
        }
        validate_transition(current, target)?;

        if let Some(updated) = self.store.compare_and_set_status(id, current, target).await? {
            tracing::info!(gig_id = id, from = %current, to = %target, "Gig status changed");
            return Ok(TransitionOutcome::Applied(updated));
        }

        // Lost a race; report what the winner left behind.
        let now = self.find(id).await?;
        if now.status() == target {
            Ok(TransitionOutcome::AlreadyInState(now))
        } else {
            Err(CoreError::Conflict(format!(
                "Gig {id} moved to '{}' while changing it to '{target}'",
                now.status()
            ))
            .into())
        }
    }

    /// [`Self::transition`] with an id taken from untrusted input.
    pub async fn transition_raw(
        &self,
        raw_id: &str,
        target: GigStatus,
    ) -> Result<TransitionOutcome, PipelineError> {
        let id = parse_gig_id(raw_id)?;
        self.transition(id, target).await
    }

    /// `New → Pending` once the moderation message is out.
    pub async fn mark_pending(
        &self,
        gig: &Gig,
        moderation: MessageRef,
        poster_file_id: Option<&str>,
    ) -> Result<Gig, PipelineError> {
        self.store.set_moderation_message(gig.id, moderation).await?;
        if let Some(file_id) = poster_file_id {
            if gig.poster_file_id.is_none() {
                self.store.set_poster_file_id(gig.id, file_id).await?;
            }
        }
        let outcome = self.transition(gig.id, GigStatus::Pending).await?;
        Ok(outcome.into_gig())
    }

    pub async fn record_post(&self, id: DbId, post: &PostRef) -> Result<(), PipelineError> {
        self.store.set_post(id, post).await?;
        Ok(())
    }

    pub async fn record_feedback(&self, id: DbId, message: MessageRef) -> Result<(), PipelineError> {
        self.store.set_feedback_message(id, message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{draft, MemoryGigStore};
    use assert_matches::assert_matches;

    fn records() -> (GigRecords, Arc<MemoryGigStore>) {
        let store = Arc::new(MemoryGigStore::new());
        (GigRecords::new(store.clone()), store)
    }

    async fn create(records: &GigRecords, title: &str) -> Gig {
        let draft = draft(title, "2026-01-23");
        let public_id = records
            .generate_unique_public_id(&draft.title, draft.date_ms)
            .await
            .unwrap();
        records
            .save(NewGig {
                draft,
                public_id,
                poster: None,
                suggested_by_user_id: None,
                submission_key: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_title_and_date_get_suffixed_ids() {
        let (records, _) = records();
        assert_eq!(create(&records, "Foo Bar").await.public_id, "foo-bar-2026-01-23");
        assert_eq!(create(&records, "Foo Bar").await.public_id, "foo-bar-2026-01-23-2");
        assert_eq!(create(&records, "Foo Bar").await.public_id, "foo-bar-2026-01-23-3");
    }

    #[tokio::test]
    async fn save_regenerates_after_losing_public_id_race() {
        let (records, _) = records();
        let first = create(&records, "Foo Bar").await;

        // A stale lookup result that another writer already claimed.
        let gig = records
            .save(NewGig {
                draft: draft("Foo Bar", "2026-01-23"),
                public_id: first.public_id.clone(),
                poster: None,
                suggested_by_user_id: Some(7),
                submission_key: None,
            })
            .await
            .unwrap();
        assert_eq!(gig.public_id, "foo-bar-2026-01-23-2");
        assert_eq!(gig.status(), GigStatus::New);
        assert_eq!(gig.suggested_by_user_id, Some(7));
    }

    #[tokio::test]
    async fn save_returns_the_gig_already_stored_for_a_submission() {
        let (records, store) = records();
        let keyed = |public_id: &str| NewGig {
            draft: draft("Foo Bar", "2026-01-23"),
            public_id: public_id.into(),
            poster: None,
            suggested_by_user_id: None,
            submission_key: Some("job-digest".into()),
        };

        let first = records.save(keyed("foo-bar-2026-01-23")).await.unwrap();
        let second = records.save(keyed("foo-bar-2026-01-23-2")).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.public_id, "foo-bar-2026-01-23");
        assert_eq!(store.len(), 1);
        assert_eq!(
            records.find_by_submission_key("job-digest").await.unwrap().map(|g| g.id),
            Some(first.id)
        );
    }

    #[tokio::test]
    async fn save_rejects_unretrievable_poster() {
        let (records, store) = records();
        let result = records
            .save(NewGig {
                draft: draft("Foo Bar", "2026-01-23"),
                public_id: "foo-bar-2026-01-23".into(),
                poster: Some(PosterAsset {
                    bucket_path: None,
                    external_url: Some("https://x.test/p.jpg".into()),
                    file_id: None,
                }),
                suggested_by_user_id: None,
                submission_key: None,
            })
            .await;
        assert_matches!(result, Err(PipelineError::Core(CoreError::Validation(_))));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn published_is_reached_only_through_the_full_chain() {
        let (records, _) = records();
        let gig = create(&records, "Foo Bar").await;

        assert_matches!(
            records.transition(gig.id, GigStatus::Published).await,
            Err(PipelineError::Core(CoreError::Conflict(_)))
        );
        assert_matches!(
            records.transition(gig.id, GigStatus::Approved).await,
            Err(PipelineError::Core(CoreError::Conflict(_)))
        );

        for status in [GigStatus::Pending, GigStatus::Approved, GigStatus::Published] {
            let outcome = records.transition(gig.id, status).await.unwrap();
            assert!(outcome.was_applied());
            assert_eq!(outcome.gig().status(), status);
        }
    }

    #[tokio::test]
    async fn reject_on_published_gig_leaves_status_alone() {
        let (records, _) = records();
        let gig = create(&records, "Foo Bar").await;
        for status in [GigStatus::Pending, GigStatus::Approved, GigStatus::Published] {
            records.transition(gig.id, status).await.unwrap();
        }

        assert_matches!(
            records.transition(gig.id, GigStatus::Rejected).await,
            Err(PipelineError::Core(CoreError::Conflict(_)))
        );
        assert_eq!(records.find(gig.id).await.unwrap().status(), GigStatus::Published);
    }

    #[tokio::test]
    async fn repeated_transition_is_a_no_op() {
        let (records, _) = records();
        let gig = create(&records, "Foo Bar").await;
        records.transition(gig.id, GigStatus::Pending).await.unwrap();

        let first = records.transition(gig.id, GigStatus::Rejected).await.unwrap();
        let second = records.transition(gig.id, GigStatus::Rejected).await.unwrap();
        assert!(first.was_applied());
        assert_matches!(second, TransitionOutcome::AlreadyInState(g) if g.status() == GigStatus::Rejected);
    }

    #[tokio::test]
    async fn transition_validates_identifier_and_existence() {
        let (records, _) = records();
        assert_matches!(
            records.transition_raw("abc", GigStatus::Pending).await,
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        assert_matches!(
            records.transition_raw("42", GigStatus::Pending).await,
            Err(PipelineError::Core(CoreError::NotFound { id: 42, .. }))
        );
    }

    #[tokio::test]
    async fn mark_pending_records_moderation_message() {
        let (records, _) = records();
        let gig = create(&records, "Foo Bar").await;
        let moderation = MessageRef {
            chat_id: -100,
            message_id: 5,
        };
        let pending = records
            .mark_pending(&gig, moderation, Some("file-1"))
            .await
            .unwrap();
        assert_eq!(pending.status(), GigStatus::Pending);
        assert_eq!(pending.moderation_message(), Some(moderation));
        assert_eq!(pending.poster_file_id.as_deref(), Some("file-1"));
    }
}
