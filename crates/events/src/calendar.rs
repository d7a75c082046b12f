//! Calendar sync for published gigs.
//!
//! [`CalendarSync`] subscribes to the bus and, for each `gig.published`,
//! posts a calendar event to the configured bridge URL through
//! [`CalendarDelivery`]. Failed attempts are retried with exponential
//! backoff (1 s, 2 s, 4 s); a final failure is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use gigs_core::env::env_opt;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::bus::{GigEvent, PublishedGig};

/// Retry delays in seconds (exponential backoff: 1s, 2s, 4s).
const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_TIME_ZONE: &str = "Europe/Madrid";
const DEFAULT_DURATION_MINS: i64 = 180;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    /// Bridge endpoint; sync is disabled when unset.
    pub webhook_url: Option<String>,
    pub time_zone: String,
    pub default_duration_mins: i64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            default_duration_mins: DEFAULT_DURATION_MINS,
        }
    }
}

impl CalendarConfig {
    /// Load calendar configuration from environment variables.
    ///
    /// | Env Var                          | Default         |
    /// |----------------------------------|-----------------|
    /// | `CALENDAR_WEBHOOK_URL`           | unset (off)     |
    /// | `CALENDAR_TIME_ZONE`             | `Europe/Madrid` |
    /// | `CALENDAR_DEFAULT_DURATION_MINS` | `180`           |
    pub fn from_env() -> Self {
        let default_duration_mins: i64 = std::env::var("CALENDAR_DEFAULT_DURATION_MINS")
            .unwrap_or_else(|_| DEFAULT_DURATION_MINS.to_string())
            .parse()
            .expect("CALENDAR_DEFAULT_DURATION_MINS must be a valid i64");

        Self {
            webhook_url: env_opt("CALENDAR_WEBHOOK_URL"),
            time_zone: env_opt("CALENDAR_TIME_ZONE").unwrap_or_else(|| DEFAULT_TIME_ZONE.into()),
            default_duration_mins,
        }
    }
}

// ---------------------------------------------------------------------------
// Calendar event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

/// Body posted to the calendar bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
}

fn rfc3339(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CalendarEvent {
    pub fn from_gig(gig: &PublishedGig, config: &CalendarConfig) -> Self {
        let end_ms = gig
            .end_date_ms
            .filter(|end| *end > gig.date_ms)
            .unwrap_or(gig.date_ms + config.default_duration_mins * 60_000);

        let mut description = format!("Tickets: {}", gig.tickets_url);
        if let Some(link) = &gig.post_link {
            description.push_str(&format!("\n{link}"));
        }

        Self {
            summary: gig.title.clone(),
            description,
            location: format!("{}, {}", gig.venue, gig.city),
            start: EventTime {
                date_time: rfc3339(gig.date_ms),
                time_zone: config.time_zone.clone(),
            },
            end: EventTime {
                date_time: rfc3339(end_ms),
                time_zone: config.time_zone.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Calendar bridge returned HTTP {0}")]
    HttpStatus(u16),
}

/// Posts calendar events to the bridge with retry.
pub struct CalendarDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl CalendarDelivery {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            retry_delays: RETRY_DELAYS_SECS.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    /// Override the backoff schedule.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Deliver one event, retrying after each configured delay.
    pub async fn deliver(&self, url: &str, event: &CalendarEvent) -> Result<(), CalendarError> {
        for (attempt, delay) in self.retry_delays.iter().enumerate() {
            match self.try_send(url, event).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %e,
                        "Calendar delivery attempt failed, retrying"
                    );
                    tokio::time::sleep(*delay).await;
                }
            }
        }

        // Final attempt after the last backoff.
        self.try_send(url, event).await.inspect_err(|e| {
            tracing::error!(error = %e, "Calendar delivery failed after all retries");
        })
    }

    async fn try_send(&self, url: &str, event: &CalendarEvent) -> Result<(), CalendarError> {
        let response = self.client.post(url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(CalendarError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for CalendarDelivery {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// Background subscriber mirroring published gigs into the calendar.
pub struct CalendarSync {
    config: CalendarConfig,
    delivery: Arc<CalendarDelivery>,
}

impl CalendarSync {
    pub fn new(config: CalendarConfig) -> Self {
        Self {
            config,
            delivery: Arc::new(CalendarDelivery::new()),
        }
    }

    pub fn with_delivery(mut self, delivery: CalendarDelivery) -> Self {
        self.delivery = Arc::new(delivery);
        self
    }

    /// The calendar event to send for `event`, if any.
    pub fn plan(&self, event: &GigEvent) -> Option<(String, CalendarEvent)> {
        let url = self.config.webhook_url.clone()?;
        let gig = event.published_gig()?;
        Some((url, CalendarEvent::from_gig(&gig, &self.config)))
    }

    /// Run until the bus is closed. Each delivery runs in its own task so a
    /// slow bridge never holds up the receiver.
    pub async fn run(self, mut receiver: broadcast::Receiver<GigEvent>) {
        if self.config.webhook_url.is_none() {
            tracing::info!("CALENDAR_WEBHOOK_URL is not set, calendar sync disabled");
        }
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some((url, calendar_event)) = self.plan(&event) else {
                        continue;
                    };
                    let delivery = Arc::clone(&self.delivery);
                    let gig_id = event.gig_id;
                    tokio::spawn(async move {
                        match delivery.deliver(&url, &calendar_event).await {
                            Ok(()) => tracing::info!(?gig_id, "Gig synced to calendar"),
                            Err(e) => {
                                tracing::error!(?gig_id, error = %e, "Calendar sync failed")
                            }
                        }
                    });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Calendar sync lagged, some gigs were not synced");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, calendar sync shutting down");
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{EventBus, GIG_REJECTED};

    fn listing() -> PublishedGig {
        PublishedGig {
            public_id: "foo-bar-2026-01-23".into(),
            title: "Foo Bar".into(),
            date_ms: 1_769_198_400_000, // 2026-01-23T20:00:00Z
            end_date_ms: None,
            venue: "Loco Club".into(),
            city: "Valencia".into(),
            country: "ES".into(),
            tickets_url: "https://t.test/1".into(),
            post_link: None,
        }
    }

    fn enabled() -> CalendarConfig {
        CalendarConfig {
            webhook_url: Some("http://127.0.0.1:9/calendar".into()),
            ..Default::default()
        }
    }

    #[test]
    fn event_defaults_to_three_hours() {
        let event = CalendarEvent::from_gig(&listing(), &CalendarConfig::default());
        assert_eq!(event.summary, "Foo Bar");
        assert_eq!(event.description, "Tickets: https://t.test/1");
        assert_eq!(event.location, "Loco Club, Valencia");
        assert_eq!(event.start.date_time, "2026-01-23T20:00:00Z");
        assert_eq!(event.end.date_time, "2026-01-23T23:00:00Z");
        assert_eq!(event.start.time_zone, "Europe/Madrid");
    }

    #[test]
    fn explicit_end_is_used() {
        let mut gig = listing();
        gig.end_date_ms = Some(gig.date_ms + 86_400_000);
        let event = CalendarEvent::from_gig(&gig, &CalendarConfig::default());
        assert_eq!(event.end.date_time, "2026-01-24T20:00:00Z");
    }

    #[test]
    fn only_published_events_are_planned() {
        let sync = CalendarSync::new(enabled());
        assert!(sync.plan(&GigEvent::published(1, &listing())).is_some());
        assert!(sync.plan(&GigEvent::new(GIG_REJECTED).with_gig(1)).is_none());

        let disabled = CalendarSync::new(CalendarConfig::default());
        assert!(disabled.plan(&GigEvent::published(1, &listing())).is_none());
    }

    #[tokio::test]
    async fn unreachable_bridge_fails_after_retries() {
        let delivery = CalendarDelivery::new().with_retry_delays(vec![Duration::ZERO; 2]);
        let event = CalendarEvent::from_gig(&listing(), &CalendarConfig::default());
        let result = delivery.deliver("http://127.0.0.1:9/calendar", &event).await;
        assert!(matches!(result, Err(CalendarError::Request(_))));
    }

    #[tokio::test]
    async fn run_stops_when_bus_closes() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let handle = tokio::spawn(CalendarSync::new(CalendarConfig::default()).run(rx));
        bus.publish(GigEvent::published(1, &listing()));
        drop(bus);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sync should stop")
            .unwrap();
    }
}
