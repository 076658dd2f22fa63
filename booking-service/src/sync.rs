//! External-calendar ingestion: download a room's feed, decode its
//! events, classify them by platform convention and re-derive the
//! room's sync-origin blocked dates, then replace those rows in one
//! store transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use shared::*;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::fetch::FeedFetcher;
use crate::ical::{parse_calendar, FeedEvent};
use crate::store::AvailabilityStore;

/// Feeds export UTC instants while check-in/out policy is local to the
/// property; shifting by two hours keeps midnight-anchored events on
/// the intended calendar day.
pub const FEED_OFFSET_HOURS: i64 = 2;

/// Turn parsed events into the room's blocked dates. First writer wins
/// per date, so an administrative closure listed before a booking keeps
/// its block type.
pub fn compute_blocked_dates(events: &[FeedEvent]) -> BTreeMap<NaiveDate, BlockType> {
    let offset = Duration::hours(FEED_OFFSET_HOURS);
    let mut blocked = BTreeMap::new();

    for event in events {
        let strategy = classify_summary(&event.summary);
        let first = (event.start + offset).date_naive();
        let last = (event.end + offset).date_naive();

        let mut days: Vec<NaiveDate> = first.iter_days().take_while(|d| *d <= last).collect();
        if !strategy.covers_all_days {
            // night-based: the last day is a checkout and stays open
            days.pop();
            if strategy.same_day_turnover && !days.is_empty() {
                // Booking.com exports the prior checkout as day one
                days.remove(0);
            }
        }

        for day in days {
            blocked.entry(day).or_insert(strategy.block_type);
        }
    }

    blocked
}

/// A configuration is due once its interval is strictly exceeded;
/// landing exactly on the boundary waits for the next tick.
fn is_due(config: &CalendarConfig, now: DateTime<Utc>) -> bool {
    match config.last_sync_at {
        None => true,
        Some(last) => now - last > Duration::hours(i64::from(config.sync_interval_hours)),
    }
}

pub struct CalendarSyncer<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
}

impl<S: AvailabilityStore, F: FeedFetcher> CalendarSyncer<S, F> {
    pub fn new(store: Arc<S>, fetcher: Arc<F>) -> Self {
        Self { store, fetcher }
    }

    /// One room's full pipeline run: fetch, parse, classify, compute,
    /// commit. Returns (event count, blocked-date count).
    pub async fn sync_room(&self, config: &CalendarConfig) -> Result<(usize, usize), Error> {
        let raw = self.fetcher.fetch(&config.feed_url).await?;
        let events = parse_calendar(&raw);
        let blocked = compute_blocked_dates(&events);

        let records: Vec<AvailabilityRecord> = blocked
            .iter()
            .map(|(date, block_type)| AvailabilityRecord {
                id: Uuid::new_v4(),
                room_id: config.room_id,
                date: *date,
                is_available: false,
                price_override: None,
                block_type: *block_type,
                sync_source: Some(config.platform.clone()),
            })
            .collect();
        let date_count = records.len();

        let deleted = self
            .store
            .replace_sync_blocks(config.room_id, &config.platform, records)
            .await?;
        info!(
            "synced room {} from {}: {} events, {} blocked dates ({} stale rows dropped)",
            config.room_id,
            config.platform,
            events.len(),
            date_count,
            deleted
        );
        Ok((events.len(), date_count))
    }
}

/// Walks the configured calendars one room at a time; sequential on
/// purpose, so one room's replace never interleaves with another write
/// to the same room and feed hosts see bounded load.
pub struct SyncOrchestrator<S, F> {
    store: Arc<S>,
    syncer: CalendarSyncer<S, F>,
}

impl<S: AvailabilityStore, F: FeedFetcher> SyncOrchestrator<S, F> {
    pub fn new(store: Arc<S>, fetcher: Arc<F>) -> Self {
        Self {
            syncer: CalendarSyncer::new(store.clone(), fetcher),
            store,
        }
    }

    /// Manual trigger: every active configuration, intervals ignored.
    pub async fn sync_all(&self) -> Result<SyncReport, Error> {
        let configs = self.store.calendar_configs(true).await?;
        Ok(self.run(configs).await)
    }

    /// Scheduled trigger: only configurations that never ran, or whose
    /// last run lies strictly more than one interval in the past.
    pub async fn process_pending(&self) -> Result<SyncReport, Error> {
        let now = Utc::now();
        let configs: Vec<CalendarConfig> = self
            .store
            .calendar_configs(true)
            .await?
            .into_iter()
            .filter(|c| is_due(c, now))
            .collect();
        Ok(self.run(configs).await)
    }

    async fn run(&self, configs: Vec<CalendarConfig>) -> SyncReport {
        let mut report = SyncReport {
            total_configs: configs.len(),
            ..SyncReport::default()
        };

        for config in configs {
            let outcome = match self.syncer.sync_room(&config).await {
                Ok((events, blocked_dates)) => SyncOutcome::Synced {
                    events,
                    blocked_dates,
                },
                Err(e) => {
                    error!(
                        "sync failed for room {} ({}): {}",
                        config.room_id, config.platform, e
                    );
                    SyncOutcome::Failed {
                        message: e.to_string(),
                    }
                }
            };

            if let Err(e) = self
                .store
                .record_sync_outcome(config.id, Utc::now(), &outcome)
                .await
            {
                warn!(
                    "could not persist sync metadata for config {}: {}",
                    config.id, e
                );
            }

            report.record(RoomSyncResult {
                config_id: config.id,
                room_id: config.room_id,
                platform: config.platform,
                outcome,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(summary: &str, start: NaiveDate, end: NaiveDate) -> FeedEvent {
        FeedEvent {
            uid: "u".to_string(),
            summary: summary.to_string(),
            start: start.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            end: end.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            description: None,
        }
    }

    #[test]
    fn airbnb_reservation_blocks_nights_only() {
        let events = vec![event("Reserved - Airbnb", date(2024, 6, 7), date(2024, 6, 11))];
        let blocked = compute_blocked_dates(&events);
        let days: Vec<_> = blocked.keys().copied().collect();
        assert_eq!(
            days,
            vec![
                date(2024, 6, 7),
                date(2024, 6, 8),
                date(2024, 6, 9),
                date(2024, 6, 10),
            ]
        );
    }

    #[test]
    fn booking_com_closed_drops_first_and_last_day() {
        let events = vec![event(
            "CLOSED - Not available",
            date(2024, 7, 1),
            date(2024, 7, 4),
        )];
        let blocked = compute_blocked_dates(&events);
        let days: Vec<_> = blocked.keys().copied().collect();
        assert_eq!(days, vec![date(2024, 7, 2), date(2024, 7, 3)]);
    }

    #[test]
    fn maintenance_covers_every_day_of_the_span() {
        let events = vec![event("Maintenance", date(2024, 7, 1), date(2024, 7, 3))];
        let blocked = compute_blocked_dates(&events);
        let days: Vec<_> = blocked.keys().copied().collect();
        assert_eq!(
            days,
            vec![date(2024, 7, 1), date(2024, 7, 2), date(2024, 7, 3)]
        );
    }

    #[test]
    fn airbnb_prep_buffer_covers_every_day() {
        let events = vec![event(
            "Airbnb (Not available)",
            date(2024, 7, 1),
            date(2024, 7, 2),
        )];
        let blocked = compute_blocked_dates(&events);
        assert_eq!(blocked.len(), 2);
        assert_eq!(blocked[&date(2024, 7, 1)], BlockType::PrepBefore);
    }

    #[test]
    fn first_event_wins_on_overlapping_dates() {
        let events = vec![
            event("Maintenance", date(2024, 7, 1), date(2024, 7, 2)),
            event("Airbnb (Not available)", date(2024, 7, 1), date(2024, 7, 2)),
        ];
        let blocked = compute_blocked_dates(&events);
        assert_eq!(blocked[&date(2024, 7, 1)], BlockType::Full);
    }

    #[test]
    fn late_evening_utc_event_lands_on_the_next_local_day() {
        // 23:00 UTC is 01:00 local under the +2h correction
        let events = vec![FeedEvent {
            uid: "u".to_string(),
            summary: "Maintenance".to_string(),
            start: date(2024, 7, 1).and_hms_opt(23, 0, 0).unwrap().and_utc(),
            end: date(2024, 7, 2).and_hms_opt(23, 0, 0).unwrap().and_utc(),
            description: None,
        }];
        let blocked = compute_blocked_dates(&events);
        let days: Vec<_> = blocked.keys().copied().collect();
        assert_eq!(days, vec![date(2024, 7, 2), date(2024, 7, 3)]);
    }

    fn config(last_sync_at: Option<chrono::DateTime<Utc>>) -> CalendarConfig {
        CalendarConfig {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            platform: "airbnb".to_string(),
            feed_url: "https://feeds.example/room.ics".to_string(),
            active: true,
            sync_interval_hours: 6,
            last_sync_at,
            last_sync_status: None,
            events_last_sync: None,
            dates_last_sync: None,
            last_error_message: None,
        }
    }

    #[test]
    fn a_never_synced_config_is_due() {
        assert!(is_due(&config(None), Utc::now()));
    }

    #[test]
    fn a_config_exactly_at_its_interval_waits_for_the_next_tick() {
        let now = Utc::now();
        assert!(!is_due(&config(Some(now - Duration::hours(6))), now));
        assert!(is_due(
            &config(Some(now - Duration::hours(6) - Duration::seconds(1))),
            now
        ));
    }

    #[test]
    fn single_day_night_based_event_blocks_nothing() {
        // start and end on the same calendar day after the shift
        let events = vec![FeedEvent {
            uid: "u".to_string(),
            summary: "Short hold".to_string(),
            start: date(2024, 7, 1).and_hms_opt(8, 0, 0).unwrap().and_utc(),
            end: date(2024, 7, 1).and_hms_opt(12, 0, 0).unwrap().and_utc(),
            description: None,
        }];
        assert!(compute_blocked_dates(&events).is_empty());
    }
}
