//! Wiring of the pipeline components.

use std::sync::Arc;

use gigs_cloud::ObjectStore;
use gigs_events::bus::EventBus;
use gigs_telegram::ChatPlatform;
use sqlx::PgPool;

use crate::callbacks::CallbackRouter;
use crate::config::PipelineConfig;
use crate::fetch::{HttpFetcher, PosterFetcher};
use crate::intake::SubmissionPipeline;
use crate::messenger::ModerationMessenger;
use crate::moderators::{ModeratorDirectory, PgModerators};
use crate::poster::PosterIngestion;
use crate::records::GigRecords;
use crate::store::{GigStore, PgGigStore};
use crate::updates::UpdateDispatcher;

/// Everything the services are built from.
pub struct ServiceDeps {
    pub gigs: Arc<dyn GigStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub platform: Arc<dyn ChatPlatform>,
    pub fetcher: Arc<dyn PosterFetcher>,
    pub moderators: Arc<dyn ModeratorDirectory>,
    pub bus: Arc<EventBus>,
    pub config: PipelineConfig,
    pub posters_prefix: String,
}

impl ServiceDeps {
    /// Production dependencies over PostgreSQL and HTTP.
    pub fn postgres(
        pool: PgPool,
        objects: Arc<dyn ObjectStore>,
        platform: Arc<dyn ChatPlatform>,
        bus: Arc<EventBus>,
        config: PipelineConfig,
        posters_prefix: impl Into<String>,
    ) -> Self {
        Self {
            gigs: Arc::new(PgGigStore::new(pool.clone())),
            objects,
            platform,
            fetcher: Arc::new(HttpFetcher::new(config.poster_download_timeout)),
            moderators: Arc::new(PgModerators::new(pool, config.moderators_cache_ttl)),
            bus,
            config,
            posters_prefix: posters_prefix.into(),
        }
    }
}

/// The assembled pipeline, cheap to clone into handlers.
#[derive(Clone)]
pub struct Services {
    pub records: GigRecords,
    pub posters: Arc<PosterIngestion>,
    pub messenger: Arc<ModerationMessenger>,
    pub submissions: Arc<SubmissionPipeline>,
    pub callbacks: Arc<CallbackRouter>,
    pub updates: Arc<UpdateDispatcher>,
    pub moderators: Arc<dyn ModeratorDirectory>,
    pub bus: Arc<EventBus>,
    pub config: PipelineConfig,
}

impl Services {
    pub fn build(deps: ServiceDeps) -> Self {
        let ServiceDeps {
            gigs,
            objects,
            platform,
            fetcher,
            moderators,
            bus,
            config,
            posters_prefix,
        } = deps;

        let records = GigRecords::new(gigs.clone());
        let posters = Arc::new(PosterIngestion::new(
            objects.clone(),
            gigs,
            fetcher.clone(),
            posters_prefix,
            config.external_poster_fallback,
        ));
        let messenger = Arc::new(ModerationMessenger::new(
            platform.clone(),
            objects,
            fetcher,
            config.clone(),
        ));
        let submissions = Arc::new(SubmissionPipeline::new(
            records.clone(),
            posters.clone(),
            messenger.clone(),
            bus.clone(),
        ));
        let callbacks = Arc::new(CallbackRouter::new(
            records.clone(),
            messenger.clone(),
            bus.clone(),
        ));
        let updates = Arc::new(UpdateDispatcher::new(callbacks.clone(), platform));

        Self {
            records,
            posters,
            messenger,
            submissions,
            callbacks,
            updates,
            moderators,
            bus,
            config,
        }
    }
}
