use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::*;
use uuid::Uuid;

use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

/// Upper bound on rows per insert statement, to keep request sizes flat
/// even for feeds that block a whole year.
pub const UPSERT_BATCH_SIZE: usize = 200;

/// Persistence boundary for the engine: confirmed bookings and
/// per-date availability rows, keyed on (room, date).
#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    async fn room(&self, room_id: Uuid) -> Result<Room, Error>;

    /// Bookings with the given status overlapping the half-open stay
    /// window (`existing.check_in < check_out AND existing.check_out >
    /// check_in`).
    async fn bookings_overlapping(
        &self,
        room_id: Uuid,
        stay: &StayRange,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, Error>;

    /// Availability rows for `room_id` with `from <= date < until`,
    /// ordered by date.
    async fn availability_in(
        &self,
        room_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<AvailabilityRecord>, Error>;

    /// Admin-path upsert: last write wins per (room, date).
    async fn upsert_availability(&self, records: Vec<AvailabilityRecord>) -> Result<(), Error>;

    /// Remove any availability row for one (room, date).
    async fn clear_date(&self, room_id: Uuid, date: NaiveDate) -> Result<(), Error>;

    /// Atomically replace the room's blocked rows originating from
    /// `source` with `records`. Rows without a matching sync source
    /// (manual blocks, other platforms) are left alone, and a conflict
    /// with such a row skips the incoming sync row rather than
    /// clobbering it. Returns the number of rows deleted.
    async fn replace_sync_blocks(
        &self,
        room_id: Uuid,
        source: &str,
        records: Vec<AvailabilityRecord>,
    ) -> Result<usize, Error>;

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error>;

    async fn booking(&self, id: Uuid) -> Result<Booking, Error>;

    /// Conditional status transition; fails with `BookingNotFound` when
    /// no booking matches both the id and the expected current status.
    async fn set_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, Error>;

    /// Transition `awaiting_payment` -> `confirmed`, re-checking inside
    /// the same transaction that no overlapping confirmed booking
    /// exists. Confirming an already-confirmed booking is a no-op, so
    /// webhook redelivery stays safe.
    async fn confirm_booking(&self, id: Uuid) -> Result<Booking, Error>;

    async fn calendar_configs(&self, only_active: bool) -> Result<Vec<CalendarConfig>, Error>;

    async fn record_sync_outcome(
        &self,
        config_id: Uuid,
        at: DateTime<Utc>,
        outcome: &SyncOutcome,
    ) -> Result<(), Error>;
}

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(
        &self,
    ) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, Error>
    {
        self.pool.get().await.map_err(|e| Error::Pool(e.to_string()))
    }
}

#[async_trait]
impl AvailabilityStore for PgStore {
    async fn room(&self, room_id: Uuid) -> Result<Room, Error> {
        let mut conn = self.conn().await?;
        let row: Option<DbRoom> = rooms::table
            .find(room_id)
            .first(&mut conn)
            .await
            .optional()?;
        row.map(Room::from).ok_or(Error::RoomNotFound(room_id))
    }

    async fn bookings_overlapping(
        &self,
        room_id: Uuid,
        stay: &StayRange,
        status: BookingStatus,
    ) -> Result<Vec<Booking>, Error> {
        let mut conn = self.conn().await?;
        let rows = bookings::table
            .filter(bookings::room_id.eq(room_id))
            .filter(bookings::status.eq(status.as_str()))
            .filter(bookings::check_in.lt(stay.check_out()))
            .filter(bookings::check_out.gt(stay.check_in()))
            .order(bookings::check_in.asc())
            .load::<DbBooking>(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn availability_in(
        &self,
        room_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<AvailabilityRecord>, Error> {
        let mut conn = self.conn().await?;
        let rows = availability::table
            .filter(availability::room_id.eq(room_id))
            .filter(availability::date.ge(from))
            .filter(availability::date.lt(until))
            .order(availability::date.asc())
            .load::<DbAvailability>(&mut conn)
            .await?;
        Ok(rows.into_iter().map(AvailabilityRecord::from).collect())
    }

    async fn upsert_availability(&self, records: Vec<AvailabilityRecord>) -> Result<(), Error> {
        let mut conn = self.conn().await?;
        let rows: Vec<DbAvailability> = records.iter().map(DbAvailability::from).collect();
        for chunk in rows.chunks(UPSERT_BATCH_SIZE) {
            diesel::insert_into(availability::table)
                .values(chunk)
                .on_conflict((availability::room_id, availability::date))
                .do_update()
                .set((
                    availability::is_available.eq(excluded(availability::is_available)),
                    availability::price_override.eq(excluded(availability::price_override)),
                    availability::block_type.eq(excluded(availability::block_type)),
                    availability::sync_source.eq(excluded(availability::sync_source)),
                ))
                .execute(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn clear_date(&self, room_id: Uuid, date: NaiveDate) -> Result<(), Error> {
        let mut conn = self.conn().await?;
        diesel::delete(
            availability::table
                .filter(availability::room_id.eq(room_id))
                .filter(availability::date.eq(date)),
        )
        .execute(&mut conn)
        .await?;
        Ok(())
    }

    async fn replace_sync_blocks(
        &self,
        room_id: Uuid,
        source: &str,
        records: Vec<AvailabilityRecord>,
    ) -> Result<usize, Error> {
        let mut conn = self.conn().await?;
        let source = source.to_string();
        let rows: Vec<DbAvailability> = records.iter().map(DbAvailability::from).collect();
        conn.transaction::<_, Error, _>(|conn| {
            Box::pin(async move {
                let deleted = diesel::delete(
                    availability::table
                        .filter(availability::room_id.eq(room_id))
                        .filter(availability::is_available.eq(false))
                        .filter(availability::sync_source.eq(&source)),
                )
                .execute(conn)
                .await?;

                for chunk in rows.chunks(UPSERT_BATCH_SIZE) {
                    diesel::insert_into(availability::table)
                        .values(chunk)
                        .on_conflict((availability::room_id, availability::date))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                }

                Ok(deleted)
            })
        })
        .await
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), Error> {
        let mut conn = self.conn().await?;
        diesel::insert_into(bookings::table)
            .values(DbBooking::from(booking))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn booking(&self, id: Uuid) -> Result<Booking, Error> {
        let mut conn = self.conn().await?;
        let row: Option<DbBooking> = bookings::table.find(id).first(&mut conn).await.optional()?;
        row.map(Booking::from).ok_or(Error::BookingNotFound(id))
    }

    async fn set_booking_status(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Booking, Error> {
        let mut conn = self.conn().await?;
        let updated: Option<DbBooking> = diesel::update(
            bookings::table
                .filter(bookings::id.eq(id))
                .filter(bookings::status.eq(from.as_str())),
        )
        .set((
            bookings::status.eq(to.as_str()),
            bookings::updated_at.eq(Utc::now()),
        ))
        .get_result(&mut conn)
        .await
        .optional()?;
        updated.map(Booking::from).ok_or(Error::BookingNotFound(id))
    }

    async fn confirm_booking(&self, id: Uuid) -> Result<Booking, Error> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, Error, _>(|conn| {
            Box::pin(async move {
                let row: Option<DbBooking> = bookings::table
                    .find(id)
                    .for_update()
                    .first(conn)
                    .await
                    .optional()?;
                let row = row.ok_or(Error::BookingNotFound(id))?;

                match BookingStatus::parse(&row.status) {
                    Some(BookingStatus::Confirmed) => return Ok(Booking::from(row)),
                    Some(BookingStatus::AwaitingPayment) => {}
                    _ => return Err(Error::BookingNotFound(id)),
                }

                let overlapping: i64 = bookings::table
                    .filter(bookings::room_id.eq(row.room_id))
                    .filter(bookings::status.eq(BookingStatus::Confirmed.as_str()))
                    .filter(bookings::check_in.lt(row.check_out))
                    .filter(bookings::check_out.gt(row.check_in))
                    .filter(bookings::id.ne(id))
                    .count()
                    .get_result(conn)
                    .await?;
                if overlapping > 0 {
                    return Err(Error::ConfirmConflict(id));
                }

                let updated: DbBooking = diesel::update(bookings::table.find(id))
                    .set((
                        bookings::status.eq(BookingStatus::Confirmed.as_str()),
                        bookings::updated_at.eq(Utc::now()),
                    ))
                    .get_result(conn)
                    .await?;
                Ok(Booking::from(updated))
            })
        })
        .await
    }

    async fn calendar_configs(&self, only_active: bool) -> Result<Vec<CalendarConfig>, Error> {
        let mut conn = self.conn().await?;
        let query = calendar_configs::table
            .order(calendar_configs::platform.asc())
            .into_boxed();
        let query = if only_active {
            query.filter(calendar_configs::active.eq(true))
        } else {
            query
        };
        let rows = query.load::<DbCalendarConfig>(&mut conn).await?;
        Ok(rows.into_iter().map(CalendarConfig::from).collect())
    }

    async fn record_sync_outcome(
        &self,
        config_id: Uuid,
        at: DateTime<Utc>,
        outcome: &SyncOutcome,
    ) -> Result<(), Error> {
        let mut conn = self.conn().await?;
        match outcome {
            SyncOutcome::Synced {
                events,
                blocked_dates,
            } => {
                diesel::update(calendar_configs::table.find(config_id))
                    .set((
                        calendar_configs::last_sync_at.eq(at),
                        calendar_configs::last_sync_status.eq("ok"),
                        calendar_configs::events_last_sync.eq(*events as i32),
                        calendar_configs::dates_last_sync.eq(*blocked_dates as i32),
                        calendar_configs::last_error_message.eq(None::<String>),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
            SyncOutcome::Failed { message } => {
                diesel::update(calendar_configs::table.find(config_id))
                    .set((
                        calendar_configs::last_sync_at.eq(at),
                        calendar_configs::last_sync_status.eq("error"),
                        calendar_configs::last_error_message.eq(message.as_str()),
                    ))
                    .execute(&mut conn)
                    .await?;
            }
        }
        Ok(())
    }
}
