//! In-memory availability store. Backs the test suite so the engine
//! can be exercised without a Postgres instance; mirrors the
//! transactional semantics of `PgStore` under a single lock.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::*;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::AvailabilityStore;

#[derive(Default)]
struct Inner {
    rooms: HashMap<Uuid, Room>,
    bookings: HashMap<Uuid, Booking>,
    availability: BTreeMap<(Uuid, NaiveDate), AvailabilityRecord>,
    configs: HashMap<Uuid, CalendarConfig>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_room(&self, room: Room) {
        self.inner.write().await.rooms.insert(room.id, room);
    }

    pub async fn add_config(&self, config: CalendarConfig) {
        self.inner.write().await.configs.insert(config.id, config);
    }

    pub async fn config(&self, id: Uuid) -> Option<CalendarConfig> {
        self.inner.read().await.configs.get(&id).cloned()
    }

    /// Every availability row for a room, ordered by date.
    pub async fn room_availability(&self, room_id: Uuid) -> Vec<AvailabilityRecord> {
        self.inner
            .read()
            .await
            .availability
            .values()
            .filter(|r| r.room_id == room_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn room(&self, room_id: Uuid) -> Result<Room, Error> {
        self.inner
            .read()
            .await
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(Error::RoomNotFound(room_id))
    }

    async fn bookings_overlapping(
        &self,
        room_id: Uuid,
        stay: &StayRange,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, Error> {
        let inner = self.inner.read().await;
        let mut found: Vec<Booking> = inner
            .bookings
            .values()
            .filter(|b| {
                b.room_id == room_id
                    && b.status == status
                    && b.check_in < stay.check_out()
                    && b.check_out > stay.check_in()
            })
            .cloned()
            .collect();
        found.sort_by_key(|b| b.check_in);
        Ok(found)
    }

    async fn availability_in(
        &self,
        room_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<AvailabilityRecord>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .availability
            .range((room_id, from)..(room_id, until))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn upsert_availability(&self, records: Vec<AvailabilityRecord>) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        for record in records {
            inner
                .availability
                .insert((record.room_id, record.date), record);
        }
        Ok(())
    }

    async fn clear_date(&self, room_id: Uuid, date: NaiveDate) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .availability
            .remove(&(room_id, date));
        Ok(())
    }

    async fn replace_sync_blocks(
        &self,
        room_id: Uuid,
        source: &str,
        records: Vec<AvailabilityRecord>,
    ) -> Result<usize, Error> {
        let mut inner = self.inner.write().await;
        let stale: Vec<(Uuid, NaiveDate)> = inner
            .availability
            .iter()
            .filter(|(_, r)| {
                r.room_id == room_id && !r.is_available && r.sync_source.as_deref() == Some(source)
            })
            .map(|(k, _)| *k)
            .collect();
        let deleted = stale.len();
        for key in stale {
            inner.availability.remove(&key);
        }
        for record in records {
            // matches the Postgres ON CONFLICT DO NOTHING: never
            // clobber a manual block or another platform's row
            inner
                .availability
                .entry((record.room_id, record.date))
                .or_insert(record);
        }
        Ok(deleted)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
        self.inner
            .write()
            .await
            .bookings
            .insert(booking.id, booking.clone());
        Ok(())
    }

    async fn booking(&self, id: Uuid) -> Result<Booking, Error> {
        self.inner
            .read()
            .await
            .bookings
            .get(&id)
            .cloned()
            .ok_or(Error::BookingNotFound(id))
    }

    async fn set_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, Error> {
        let mut inner = self.inner.write().await;
        let booking = inner
            .bookings
            .get_mut(&id)
            .filter(|b| b.status == from)
            .ok_or(Error::BookingNotFound(id))?;
        booking.status = to;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn confirm_booking(&self, id: Uuid) -> Result<Booking, Error> {
        let mut inner = self.inner.write().await;
        let candidate = inner
            .bookings
            .get(&id)
            .cloned()
            .ok_or(Error::BookingNotFound(id))?;
        match candidate.status {
            BookingStatus::Confirmed => return Ok(candidate),
            BookingStatus::AwaitingPayment => {}
            _ => return Err(Error::BookingNotFound(id)),
        }

        let overlapping = inner.bookings.values().any(|b| {
            b.id != id
                && b.room_id == candidate.room_id
                && b.status == BookingStatus::Confirmed
                && b.check_in < candidate.check_out
                && b.check_out > candidate.check_in
        });
        if overlapping {
            return Err(Error::ConfirmConflict(id));
        }

        let mut confirmed = candidate;
        confirmed.status = BookingStatus::Confirmed;
        confirmed.updated_at = Utc::now();
        inner.bookings.insert(id, confirmed.clone());
        Ok(confirmed)
    }

    async fn calendar_configs(&self, only_active: bool) -> Result<Vec<CalendarConfig>, Error> {
        let inner = self.inner.read().await;
        let mut configs: Vec<CalendarConfig> = inner
            .configs
            .values()
            .filter(|c| !only_active || c.active)
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.platform.cmp(&b.platform));
        Ok(configs)
    }

    async fn record_sync_outcome(
        &self,
        config_id: Uuid,
        at: DateTime<Utc>,
        outcome: &SyncOutcome,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        let config = inner
            .configs
            .get_mut(&config_id)
            .ok_or_else(|| Error::Pool(format!("unknown calendar config {config_id}")))?;
        config.last_sync_at = Some(at);
        match outcome {
            SyncOutcome::Synced {
                events,
                blocked_dates,
            } => {
                config.last_sync_status = Some("ok".to_string());
                config.events_last_sync = Some(*events as i32);
                config.dates_last_sync = Some(*blocked_dates as i32);
                config.last_error_message = None;
            }
            SyncOutcome::Failed { message } => {
                config.last_sync_status = Some("error".to_string());
                config.last_error_message = Some(message.clone());
            }
        }
        Ok(())
    }
}
