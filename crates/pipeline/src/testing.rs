//! In-memory fakes for the pipeline's collaborators, shared with the
//! integration tests of the server and the worker.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use gigs_cloud::MemoryStore;
use gigs_core::gig::{GigDraft, GigFields, GigStatus, MessageRef, PostRef};
use gigs_core::poster::filename_from_url;
use gigs_core::types::{ChatId, DbId};
use gigs_db::models::gig::{CreateGig, Gig};
use gigs_events::bus::EventBus;
use gigs_telegram::types::{
    CallbackAnswer, CallbackQuery, Chat, InlineKeyboardMarkup, Message, OutgoingMessage,
    PhotoInput, PhotoSize, User,
};
use gigs_telegram::{BotApiError, ChatPlatform};

use crate::config::PipelineConfig;
use crate::fetch::{FetchError, FetchedPoster, PosterFetcher};
use crate::intake::Submission;
use crate::moderators::StaticModerators;
use crate::services::{ServiceDeps, Services};
use crate::store::{GigStore, StoreError};

pub const MODERATION_CHAT: ChatId = -100_111;
pub const MAIN_CHAT: ChatId = -100_222;
pub const MODERATOR_ID: ChatId = 77;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Complete submission fields in Valencia.
pub fn fields(title: &str, date: &str) -> GigFields {
    GigFields {
        title: Some(title.into()),
        date: Some(date.into()),
        city: Some("Valencia".into()),
        country: Some("es".into()),
        venue: Some("Loco Club".into()),
        tickets_url: Some("https://t.test/1".into()),
        ..Default::default()
    }
}

pub fn draft(title: &str, date: &str) -> GigDraft {
    GigDraft::from_fields(&fields(title, date)).expect("fixture fields are valid")
}

/// A `New` gig row that was never stored.
pub fn gig_fixture(id: DbId) -> Gig {
    let draft = draft("Foo Bar", "2026-01-23");
    Gig {
        id,
        public_id: format!("foo-bar-2026-01-23-{id}"),
        title: draft.title,
        date_ms: draft.date_ms,
        end_date_ms: None,
        venue: draft.venue,
        city: draft.city,
        country: draft.country,
        tickets_url: draft.tickets_url,
        poster_bucket_path: None,
        poster_external_url: None,
        poster_file_id: None,
        status_id: GigStatus::New.id(),
        post_message_id: None,
        post_chat_id: None,
        post_file_id: None,
        suggested_by_user_id: None,
        suggested_by_feedback_chat_id: None,
        suggested_by_feedback_message_id: None,
        moderation_chat_id: None,
        moderation_message_id: None,
        submission_key: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A button press by [`MODERATOR_ID`] on a moderation message.
pub fn callback_query(id: &str, data: &str) -> CallbackQuery {
    CallbackQuery {
        id: id.into(),
        from: User {
            id: MODERATOR_ID,
            is_bot: false,
            first_name: "Mod".into(),
            username: None,
        },
        message: Some(Message {
            message_id: 1,
            chat: chat(MODERATION_CHAT),
            from: None,
            date: 0,
            text: None,
            caption: None,
            photo: None,
        }),
        data: Some(data.into()),
    }
}

fn chat(id: ChatId) -> Chat {
    Chat {
        id,
        kind: if id < 0 { "channel" } else { "private" }.into(),
        title: None,
        username: None,
    }
}

// ---------------------------------------------------------------------------
// MemoryGigStore
// ---------------------------------------------------------------------------

/// [`GigStore`] over a vector, enforcing public id and submission key
/// uniqueness.
#[derive(Default)]
pub struct MemoryGigStore {
    gigs: Mutex<Vec<Gig>>,
}

impl MemoryGigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.gigs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Gig> {
        lock(&self.gigs).clone()
    }

    fn update<F: FnOnce(&mut Gig)>(&self, id: DbId, apply: F) {
        if let Some(gig) = lock(&self.gigs).iter_mut().find(|g| g.id == id) {
            apply(gig);
            gig.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl GigStore for MemoryGigStore {
    async fn insert(&self, input: &CreateGig) -> Result<Gig, StoreError> {
        let mut gigs = lock(&self.gigs);
        if gigs.iter().any(|g| g.public_id == input.public_id) {
            return Err(StoreError::PublicIdTaken(input.public_id.clone()));
        }
        if let Some(key) = &input.submission_key {
            if gigs.iter().any(|g| g.submission_key.as_ref() == Some(key)) {
                return Err(StoreError::SubmissionKeyTaken(key.clone()));
            }
        }
        let poster = input.poster.clone().unwrap_or_default();
        let mut gig = gig_fixture(gigs.len() as DbId + 1);
        gig.public_id = input.public_id.clone();
        gig.title = input.title.clone();
        gig.date_ms = input.date_ms;
        gig.end_date_ms = input.end_date_ms;
        gig.venue = input.venue.clone();
        gig.city = input.city.clone();
        gig.country = input.country.clone();
        gig.tickets_url = input.tickets_url.clone();
        gig.poster_bucket_path = poster.bucket_path;
        gig.poster_external_url = poster.external_url;
        gig.poster_file_id = poster.file_id;
        gig.suggested_by_user_id = input.suggested_by_user_id;
        gig.submission_key = input.submission_key.clone();
        gigs.push(gig.clone());
        Ok(gig)
    }

    async fn find(&self, id: DbId) -> Result<Option<Gig>, StoreError> {
        Ok(lock(&self.gigs).iter().find(|g| g.id == id).cloned())
    }

    async fn find_by_submission_key(&self, key: &str) -> Result<Option<Gig>, StoreError> {
        Ok(lock(&self.gigs)
            .iter()
            .find(|g| g.submission_key.as_deref() == Some(key))
            .cloned())
    }

    async fn public_id_exists(&self, public_id: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.gigs).iter().any(|g| g.public_id == public_id))
    }

    async fn find_by_external_poster_url(&self, url: &str) -> Result<Option<Gig>, StoreError> {
        Ok(lock(&self.gigs)
            .iter()
            .find(|g| g.poster_external_url.as_deref() == Some(url) && g.poster_bucket_path.is_some())
            .cloned())
    }

    async fn find_by_poster_bucket_path(&self, key: &str) -> Result<Option<Gig>, StoreError> {
        Ok(lock(&self.gigs)
            .iter()
            .find(|g| g.poster_bucket_path.as_deref() == Some(key))
            .cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: DbId,
        expected: GigStatus,
        next: GigStatus,
    ) -> Result<Option<Gig>, StoreError> {
        let mut gigs = lock(&self.gigs);
        let Some(gig) = gigs
            .iter_mut()
            .find(|g| g.id == id && g.status_id == expected.id())
        else {
            return Ok(None);
        };
        gig.status_id = next.id();
        gig.updated_at = Utc::now();
        Ok(Some(gig.clone()))
    }

    async fn set_poster_file_id(&self, id: DbId, file_id: &str) -> Result<(), StoreError> {
        self.update(id, |g| g.poster_file_id = Some(file_id.to_string()));
        Ok(())
    }

    async fn set_post(&self, id: DbId, post: &PostRef) -> Result<(), StoreError> {
        self.update(id, |g| {
            g.post_message_id = Some(post.message_id);
            g.post_chat_id = Some(post.chat_id);
            g.post_file_id = post.file_id.clone();
        });
        Ok(())
    }

    async fn set_feedback_message(&self, id: DbId, message: MessageRef) -> Result<(), StoreError> {
        self.update(id, |g| {
            g.suggested_by_feedback_chat_id = Some(message.chat_id);
            g.suggested_by_feedback_message_id = Some(message.message_id);
        });
        Ok(())
    }

    async fn set_moderation_message(
        &self,
        id: DbId,
        message: MessageRef,
    ) -> Result<(), StoreError> {
        self.update(id, |g| {
            g.moderation_chat_id = Some(message.chat_id);
            g.moderation_message_id = Some(message.message_id);
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingPlatform
// ---------------------------------------------------------------------------

/// One outbound platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    SendMessage(OutgoingMessage),
    SendPhoto {
        message: OutgoingMessage,
        photo: PhotoInput,
    },
    AnswerCallback(CallbackAnswer),
    EditMarkup {
        chat_id: ChatId,
        message_id: i64,
        markup: Option<InlineKeyboardMarkup>,
    },
}

impl PlatformCall {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SendMessage(_) => "send_message",
            Self::SendPhoto { .. } => "send_photo",
            Self::AnswerCallback(_) => "answer_callback",
            Self::EditMarkup { .. } => "edit_markup",
        }
    }

    /// Target chat of sends and edits.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::SendMessage(message) | Self::SendPhoto { message, .. } => Some(message.chat_id),
            Self::EditMarkup { chat_id, .. } => Some(*chat_id),
            Self::AnswerCallback(_) => None,
        }
    }
}

#[derive(Default)]
struct Failures {
    photo_urls: bool,
    uploads: bool,
    answers: bool,
    edits_not_modified: bool,
    blocked_chats: Mutex<HashSet<ChatId>>,
}

/// [`ChatPlatform`] that records every call and fails on demand.
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    next_message_id: AtomicI64,
    failures: Failures,
}

impl Default for RecordingPlatform {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(100),
            failures: Failures::default(),
        }
    }
}

fn api_error(code: i64, description: &str) -> BotApiError {
    BotApiError::Api {
        code,
        description: description.to_string(),
    }
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse photo URLs the way the platform does for unfetchable hosts.
    pub fn reject_photo_urls(mut self) -> Self {
        self.failures.photo_urls = true;
        self
    }

    pub fn fail_uploads(mut self) -> Self {
        self.failures.uploads = true;
        self
    }

    pub fn fail_answers(mut self) -> Self {
        self.failures.answers = true;
        self
    }

    /// Every edit reports "message is not modified".
    pub fn edits_not_modified(mut self) -> Self {
        self.failures.edits_not_modified = true;
        self
    }

    /// Sends to `chat_id` fail as if the user never started the bot.
    pub fn block_chat(self, chat_id: ChatId) -> Self {
        lock(&self.failures.blocked_chats).insert(chat_id);
        self
    }

    /// Let sends to a chat blocked with [`Self::block_chat`] through again.
    pub fn unblock_chat(&self, chat_id: ChatId) {
        lock(&self.failures.blocked_chats).remove(&chat_id);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.calls).clone()
    }

    pub fn answers(&self) -> Vec<CallbackAnswer> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::AnswerCallback(answer) => Some(answer),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(ChatId, i64, Option<InlineKeyboardMarkup>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::EditMarkup {
                    chat_id,
                    message_id,
                    markup,
                } => Some((chat_id, message_id, markup)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.calls).push(call);
    }

    fn check_chat(&self, chat_id: ChatId) -> Result<(), BotApiError> {
        if lock(&self.failures.blocked_chats).contains(&chat_id) {
            return Err(api_error(403, "Forbidden: bot can't initiate conversation with a user"));
        }
        Ok(())
    }

    fn reply(&self, message: &OutgoingMessage, with_photo: bool) -> Message {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let photo = with_photo.then(|| {
            vec![
                PhotoSize {
                    file_id: format!("photo-{message_id}-small"),
                    file_unique_id: None,
                    width: 90,
                    height: 90,
                    file_size: Some(1_000),
                },
                PhotoSize {
                    file_id: format!("photo-{message_id}-large"),
                    file_unique_id: None,
                    width: 1280,
                    height: 1280,
                    file_size: Some(90_000),
                },
            ]
        });
        Message {
            message_id,
            chat: chat(message.chat_id),
            from: None,
            date: 0,
            text: (!with_photo).then(|| message.text.clone()),
            caption: with_photo.then(|| message.text.clone()),
            photo,
        }
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, BotApiError> {
        self.record(PlatformCall::SendMessage(message.clone()));
        self.check_chat(message.chat_id)?;
        Ok(self.reply(message, false))
    }

    async fn send_photo(
        &self,
        message: &OutgoingMessage,
        photo: &PhotoInput,
    ) -> Result<Message, BotApiError> {
        self.record(PlatformCall::SendPhoto {
            message: message.clone(),
            photo: photo.clone(),
        });
        self.check_chat(message.chat_id)?;
        match photo {
            PhotoInput::Url(_) if self.failures.photo_urls => {
                Err(api_error(400, "Bad Request: wrong type of the web page content"))
            }
            PhotoInput::Upload { .. } if self.failures.uploads => {
                Err(api_error(400, "Bad Request: IMAGE_PROCESS_FAILED"))
            }
            _ => Ok(self.reply(message, true)),
        }
    }

    async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), BotApiError> {
        self.record(PlatformCall::AnswerCallback(answer.clone()));
        if self.failures.answers {
            return Err(api_error(400, "Bad Request: query is too old and response timeout expired"));
        }
        Ok(())
    }

    async fn edit_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), BotApiError> {
        self.record(PlatformCall::EditMarkup {
            chat_id,
            message_id,
            markup: markup.cloned(),
        });
        if self.failures.edits_not_modified {
            return Err(api_error(
                400,
                "Bad Request: message is not modified: specified new message content and reply markup are exactly the same",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StubFetcher
// ---------------------------------------------------------------------------

/// [`PosterFetcher`] with canned responses. Unknown URLs answer HTTP 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: HashMap<String, Result<FetchedPoster, FetchError>>,
    fetches: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, url: &str, bytes: &[u8], content_type: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Ok(FetchedPoster {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
                filename: filename_from_url(url),
            }),
        );
        self
    }

    pub fn with_failure(mut self, url: &str, error: FetchError) -> Self {
        self.responses.insert(url.to_string(), Err(error));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PosterFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPoster, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::HttpStatus(404)))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Fully wired [`Services`] over the fakes above.
pub struct Harness {
    pub store: Arc<MemoryGigStore>,
    pub objects: Arc<MemoryStore>,
    pub platform: Arc<RecordingPlatform>,
    pub fetcher: Arc<StubFetcher>,
    pub bus: Arc<EventBus>,
    pub services: Services,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(RecordingPlatform::new(), StubFetcher::new())
    }

    pub fn with_platform(platform: RecordingPlatform) -> Self {
        Self::build(platform, StubFetcher::new())
    }

    pub fn with_fetcher(fetcher: StubFetcher) -> Self {
        Self::build(RecordingPlatform::new(), fetcher)
    }

    pub fn config() -> PipelineConfig {
        PipelineConfig {
            app_base_url: Some("https://gigs.test".into()),
            api_base_url: Some("https://api.gigs.test".into()),
            ..PipelineConfig::new(MODERATION_CHAT, MAIN_CHAT)
        }
    }

    pub fn build(platform: RecordingPlatform, fetcher: StubFetcher) -> Self {
        let store = Arc::new(MemoryGigStore::new());
        let objects = Arc::new(MemoryStore::new());
        let platform = Arc::new(platform);
        let fetcher = Arc::new(fetcher);
        let bus = Arc::new(EventBus::default());

        let services = Services::build(ServiceDeps {
            gigs: store.clone(),
            objects: objects.clone(),
            platform: platform.clone(),
            fetcher: fetcher.clone(),
            moderators: Arc::new(StaticModerators::new([MODERATOR_ID])),
            bus: bus.clone(),
            config: Self::config(),
            posters_prefix: "gigs".into(),
        });

        Self {
            store,
            objects,
            platform,
            fetcher,
            bus,
            services,
        }
    }

    /// Submit a gig without poster or submitter; it ends up `Pending`.
    pub async fn submit_pending(&self, title: &str, date: &str) -> Gig {
        self.services
            .submissions
            .submit(Submission {
                fields: fields(title, date),
                ..Default::default()
            })
            .await
            .expect("fixture submission succeeds")
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
