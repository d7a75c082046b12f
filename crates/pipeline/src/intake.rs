//! Submission intake shared by the HTTP endpoint and the queue consumer:
//! validate, allocate a public id, ingest the poster, save, then hand the
//! gig to the moderators.

use std::sync::Arc;

use chrono::Utc;
use gigs_core::gig::{GigDraft, GigFields, GigStatus, MessageRef, PosterAsset};
use gigs_core::job::{CreateGigJob, JobGig, JobMeta, JobPoster, RequestedBy};
use gigs_core::types::ChatId;
use gigs_db::models::gig::Gig;
use gigs_events::bus::{EventBus, GigEvent, GIG_SUBMITTED};
use gigs_telegram::photo::biggest_photo_file_id;

use crate::error::PipelineError;
use crate::messenger::ModerationMessenger;
use crate::poster::{PosterContext, PosterIngestion, PosterSource};
use crate::records::{GigRecords, NewGig};

/// Verified end user behind a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitter {
    pub user_id: ChatId,
    pub is_admin: bool,
}

/// One intake call.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub fields: GigFields,
    /// Explicit poster (multipart upload or queued object). Falls back to
    /// `posterFile` / `posterUrl` in `fields`.
    pub poster: Option<PosterSource>,
    pub submitter: Option<Submitter>,
}

impl Submission {
    pub fn from_job(job: CreateGigJob) -> Self {
        let CreateGigJob {
            gig, requested_by, ..
        } = job;
        let poster = gig.poster.map(|p| PosterSource::Stored {
            bucket_path: p.bucket_path,
            external_url: p.external_url,
        });
        let submitter = requested_by.and_then(|r| {
            r.user_id.map(|user_id| Submitter {
                user_id,
                is_admin: r.is_admin.unwrap_or(false),
            })
        });
        Self {
            fields: gig.fields,
            poster,
            submitter,
        }
    }
}

pub struct SubmissionPipeline {
    records: GigRecords,
    posters: Arc<PosterIngestion>,
    messenger: Arc<ModerationMessenger>,
    bus: Arc<EventBus>,
}

impl SubmissionPipeline {
    pub fn new(
        records: GigRecords,
        posters: Arc<PosterIngestion>,
        messenger: Arc<ModerationMessenger>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            records,
            posters,
            messenger,
            bus,
        }
    }

    /// Validate, ingest the poster and allocate the public id.
    async fn prepare(
        &self,
        submission: &Submission,
    ) -> Result<(GigDraft, String, Option<PosterAsset>), PipelineError> {
        let draft = GigDraft::from_fields(&submission.fields)?;
        let public_id = self
            .records
            .generate_unique_public_id(&draft.title, draft.date_ms)
            .await?;

        let source = match &submission.poster {
            Some(source) => Some(source.clone()),
            None => PosterSource::from_fields(&submission.fields)?,
        };
        let poster = match source {
            Some(source) => {
                let ctx = PosterContext {
                    date_ms: draft.date_ms,
                    country: &draft.country,
                    city: &draft.city,
                    public_id: &public_id,
                };
                self.posters.ingest(source, ctx).await?
            }
            None => None,
        };
        Ok((draft, public_id, poster))
    }

    /// Create a gig and send it to moderation.
    ///
    /// Returns the gig in `Pending`. When the moderation message cannot be
    /// sent the gig stays `New` and the error is returned.
    pub async fn submit(&self, submission: Submission) -> Result<Gig, PipelineError> {
        let submitter = submission.submitter;
        let gig = self.create(submission, None).await?;
        self.moderate(gig, submitter).await
    }

    /// Run a queued job through the same path as [`Self::submit`].
    ///
    /// `submission_key` is shared by every delivery of the job. A gig already
    /// stored under it is not created again: a `New` one goes back to
    /// moderation, any later status means the job already completed.
    pub async fn process_job(
        &self,
        job: CreateGigJob,
        submission_key: &str,
    ) -> Result<Gig, PipelineError> {
        let submission = Submission::from_job(job);
        let submitter = submission.submitter;
        let gig = match self.records.find_by_submission_key(submission_key).await? {
            Some(existing) => {
                tracing::info!(
                    gig_id = existing.id,
                    status = %existing.status(),
                    "Job redelivered for a stored gig"
                );
                existing
            }
            None => {
                let key = Some(submission_key.to_string());
                self.create(submission, key).await?
            }
        };

        if gig.status() == GigStatus::New {
            self.moderate(gig, submitter).await
        } else {
            Ok(gig)
        }
    }

    async fn create(
        &self,
        submission: Submission,
        submission_key: Option<String>,
    ) -> Result<Gig, PipelineError> {
        let (draft, public_id, poster) = self.prepare(&submission).await?;
        let submitter = submission.submitter;
        tracing::info!(
            public_id = %public_id,
            user_id = ?submitter.map(|s| s.user_id),
            is_admin = submitter.is_some_and(|s| s.is_admin),
            has_poster = poster.is_some(),
            "Gig submitted"
        );

        let gig = self
            .records
            .save(NewGig {
                draft,
                public_id,
                poster,
                suggested_by_user_id: submitter.map(|s| s.user_id),
                submission_key,
            })
            .await?;
        Ok(gig)
    }

    /// Front half of a queued submission: validate and store the poster,
    /// then build the job the worker completes.
    pub async fn stage(&self, submission: Submission) -> Result<CreateGigJob, PipelineError> {
        let (_, public_id, poster) = self.prepare(&submission).await?;
        tracing::debug!(public_id = %public_id, "Submission staged for the queue");

        let mut fields = submission.fields;
        fields.poster_file = None;
        Ok(CreateGigJob {
            gig: JobGig {
                fields,
                poster: poster.map(|p| JobPoster {
                    bucket_path: p.bucket_path,
                    external_url: p.external_url,
                }),
            },
            requested_by: Some(RequestedBy {
                is_admin: Some(submission.submitter.is_some_and(|s| s.is_admin)),
                user_id: submission.submitter.map(|s| s.user_id),
            }),
            meta: Some(JobMeta {
                enqueued_at: Some(Utc::now()),
            }),
        })
    }

    async fn moderate(&self, gig: Gig, submitter: Option<Submitter>) -> Result<Gig, PipelineError> {
        let sent = self
            .messenger
            .send_to_moderation(&gig)
            .await
            .inspect_err(|e| {
                tracing::error!(gig_id = gig.id, error = %e, "Moderation send failed, gig stays new");
            })?;

        let file_id = sent.photo.as_deref().and_then(biggest_photo_file_id);
        let moderation = MessageRef {
            chat_id: sent.chat.id,
            message_id: sent.message_id,
        };
        let mut gig = self.records.mark_pending(&gig, moderation, file_id).await?;

        if let Some(submitter) = submitter {
            if let Some(feedback) = self
                .messenger
                .send_submission_feedback(&gig, submitter.user_id)
                .await
            {
                match self.records.record_feedback(gig.id, feedback).await {
                    Ok(()) => {
                        gig.suggested_by_feedback_chat_id = Some(feedback.chat_id);
                        gig.suggested_by_feedback_message_id = Some(feedback.message_id);
                    }
                    Err(e) => {
                        tracing::warn!(gig_id = gig.id, error = %e, "Failed to record feedback message");
                    }
                }
            }
        }

        let mut event = GigEvent::new(GIG_SUBMITTED)
            .with_gig(gig.id)
            .with_payload(serde_json::json!({ "publicId": gig.public_id }));
        if let Some(submitter) = submitter {
            event = event.with_actor(submitter.user_id);
        }
        self.bus.publish(event);

        Ok(gig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fields, Harness, PlatformCall, RecordingPlatform, StubFetcher, MODERATION_CHAT};
    use assert_matches::assert_matches;
    use gigs_core::error::CoreError;
    use gigs_core::hashing::short_digest;
    use gigs_core::job::{decode_job, submission_key};

    const POSTER_URL: &str = "https://cdn.test/posters/foo.png";

    #[tokio::test]
    async fn submit_sends_to_moderation_and_marks_pending() {
        let harness = Harness::new();
        let gig = harness
            .services
            .submissions
            .submit(Submission {
                fields: fields("Foo Bar", "2026-01-23"),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(gig.public_id, "foo-bar-2026-01-23");
        assert_eq!(gig.status(), GigStatus::Pending);
        assert_eq!(gig.moderation_message().map(|m| m.chat_id), Some(MODERATION_CHAT));
        assert_eq!(harness.platform.calls().len(), 1);
    }

    #[tokio::test]
    async fn same_poster_url_is_downloaded_once() {
        let harness = Harness::with_fetcher(
            StubFetcher::new().with_image(POSTER_URL, b"png", "image/png"),
        );
        let mut first_fields = fields("Foo Bar", "2026-01-23");
        first_fields.poster_url = Some(POSTER_URL.into());

        let first = harness
            .services
            .submissions
            .submit(Submission {
                fields: first_fields.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = harness
            .services
            .submissions
            .submit(Submission {
                fields: first_fields,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(second.public_id, "foo-bar-2026-01-23-2");
        assert_eq!(harness.fetcher.fetch_count(), 1);
        assert_eq!(harness.objects.put_count(), 1);
        assert_eq!(first.poster_bucket_path, second.poster_bucket_path);
        assert!(first.poster_bucket_path.is_some());
    }

    #[tokio::test]
    async fn submitter_gets_feedback() {
        let harness = Harness::new();
        let gig = harness
            .services
            .submissions
            .submit(Submission {
                fields: fields("Foo Bar", "2026-01-23"),
                poster: None,
                submitter: Some(Submitter {
                    user_id: 55,
                    is_admin: false,
                }),
            })
            .await
            .unwrap();
        assert_eq!(gig.suggested_by_user_id, Some(55));
        assert_eq!(gig.feedback_message().map(|m| m.chat_id), Some(55));
        let stored = harness.services.records.find(gig.id).await.unwrap();
        assert_eq!(stored.feedback_message(), gig.feedback_message());
    }

    #[tokio::test]
    async fn blocked_submitter_does_not_fail_submission() {
        let harness = Harness::with_platform(RecordingPlatform::new().block_chat(55));
        let gig = harness
            .services
            .submissions
            .submit(Submission {
                fields: fields("Foo Bar", "2026-01-23"),
                poster: None,
                submitter: Some(Submitter {
                    user_id: 55,
                    is_admin: true,
                }),
            })
            .await
            .unwrap();
        assert_eq!(gig.status(), GigStatus::Pending);
        assert_eq!(gig.feedback_message(), None);
    }

    #[tokio::test]
    async fn moderation_send_failure_leaves_gig_new() {
        let harness = Harness::with_platform(RecordingPlatform::new().block_chat(MODERATION_CHAT));
        let result = harness
            .services
            .submissions
            .submit(Submission {
                fields: fields("Foo Bar", "2026-01-23"),
                ..Default::default()
            })
            .await;
        assert_matches!(result, Err(PipelineError::Platform(_)));
        let gig = harness.store.all().pop().unwrap();
        assert_eq!(gig.status(), GigStatus::New);
    }

    #[tokio::test]
    async fn invalid_fields_create_nothing() {
        let harness = Harness::new();
        let mut bad = fields("Foo Bar", "2026-01-23");
        bad.country = Some("Spain".into());
        let result = harness
            .services
            .submissions
            .submit(Submission {
                fields: bad,
                ..Default::default()
            })
            .await;
        assert_matches!(result, Err(PipelineError::Core(CoreError::Validation(_))));
        assert!(harness.store.all().is_empty());
        assert!(harness.platform.calls().is_empty());
    }

    #[tokio::test]
    async fn staged_job_round_trips_through_the_worker_path() {
        let harness = Harness::new();
        let mut staged_fields = fields("Foo Bar", "2026-01-23");
        staged_fields.poster_file = Some("data:image/png;base64,aGVsbG8=".into());

        let job = harness
            .services
            .submissions
            .stage(Submission {
                fields: staged_fields,
                poster: None,
                submitter: Some(Submitter {
                    user_id: 55,
                    is_admin: false,
                }),
            })
            .await
            .unwrap();
        assert!(job.gig.fields.poster_file.is_none());
        let bucket_path = job.gig.poster.as_ref().unwrap().bucket_path.clone().unwrap();
        assert_eq!(
            bucket_path,
            format!("gigs/2026/es/valencia/foo-bar-2026-01-23-{}.png", short_digest(b"hello"))
        );
        assert!(harness.store.all().is_empty());

        let payload = job.to_bytes().unwrap();
        let decoded = decode_job(&payload).unwrap();
        let gig = harness
            .services
            .submissions
            .process_job(decoded, &submission_key(&payload))
            .await
            .unwrap();
        assert_eq!(gig.poster_bucket_path.as_deref(), Some(bucket_path.as_str()));
        assert_eq!(gig.suggested_by_user_id, Some(55));
        assert_eq!(harness.objects.put_count(), 1);
        assert!(harness
            .platform
            .calls()
            .iter()
            .any(|c| matches!(c, PlatformCall::SendPhoto { .. })));
    }

    #[tokio::test]
    async fn repeated_job_resumes_the_gig_left_new() {
        let harness = Harness::with_platform(RecordingPlatform::new().block_chat(MODERATION_CHAT));
        let job = CreateGigJob {
            gig: JobGig {
                fields: fields("Foo Bar", "2026-01-23"),
                poster: None,
            },
            ..Default::default()
        };
        let key = submission_key(&job.to_bytes().unwrap());
        let submissions = &harness.services.submissions;

        for _ in 0..3 {
            let result = submissions.process_job(job.clone(), &key).await;
            assert_matches!(result, Err(PipelineError::Platform(_)));
        }
        assert_eq!(harness.store.len(), 1);
        assert_eq!(harness.store.all()[0].status(), GigStatus::New);

        harness.platform.unblock_chat(MODERATION_CHAT);
        let gig = submissions.process_job(job.clone(), &key).await.unwrap();
        assert_eq!(gig.status(), GigStatus::Pending);
        assert_eq!(gig.public_id, "foo-bar-2026-01-23");

        let sends = harness.platform.calls().len();
        let again = submissions.process_job(job, &key).await.unwrap();
        assert_eq!(again.id, gig.id);
        assert_eq!(again.status(), GigStatus::Pending);
        assert_eq!(harness.platform.calls().len(), sends);
        assert_eq!(harness.store.len(), 1);
    }
}
