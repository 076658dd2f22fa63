use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::*;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::rooms)]
pub struct DbRoom {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub base_price: bigdecimal::BigDecimal,
    pub high_season_price: bigdecimal::BigDecimal,
    pub cleaning_fee: bigdecimal::BigDecimal,
    pub minimum_stay: i32,
}

impl From<DbRoom> for Room {
    fn from(row: DbRoom) -> Self {
        Self {
            id: row.id,
            name: row.name,
            capacity: row.capacity,
            base_price: row.base_price,
            high_season_price: row.high_season_price,
            cleaning_fee: row.cleaning_fee,
            minimum_stay: row.minimum_stay,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::bookings)]
pub struct DbBooking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: String,
    pub guest_name: String,
    pub guest_email: String,
    pub total_price: bigdecimal::BigDecimal,
    pub total_nights: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbBooking> for Booking {
    fn from(row: DbBooking) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            check_in: row.check_in,
            check_out: row.check_out,
            // unknown status strings are treated as dead bookings
            status: BookingStatus::parse(&row.status).unwrap_or(BookingStatus::Cancelled),
            guest_name: row.guest_name,
            guest_email: row.guest_email,
            total_price: row.total_price,
            total_nights: row.total_nights,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Booking> for DbBooking {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            room_id: booking.room_id,
            check_in: booking.check_in,
            check_out: booking.check_out,
            status: booking.status.as_str().to_string(),
            guest_name: booking.guest_name.clone(),
            guest_email: booking.guest_email.clone(),
            total_price: booking.total_price.clone(),
            total_nights: booking.total_nights,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::availability)]
pub struct DbAvailability {
    pub id: Uuid,
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub is_available: bool,
    pub price_override: Option<bigdecimal::BigDecimal>,
    pub block_type: String,
    pub sync_source: Option<String>,
}

impl From<DbAvailability> for AvailabilityRecord {
    fn from(row: DbAvailability) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            date: row.date,
            is_available: row.is_available,
            price_override: row.price_override,
            block_type: BlockType::parse(&row.block_type),
            sync_source: row.sync_source,
        }
    }
}

impl From<&AvailabilityRecord> for DbAvailability {
    fn from(record: &AvailabilityRecord) -> Self {
        Self {
            id: record.id,
            room_id: record.room_id,
            date: record.date,
            is_available: record.is_available,
            price_override: record.price_override.clone(),
            block_type: record.block_type.as_str().to_string(),
            sync_source: record.sync_source.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::calendar_configs)]
pub struct DbCalendarConfig {
    pub id: Uuid,
    pub room_id: Uuid,
    pub platform: String,
    pub feed_url: String,
    pub active: bool,
    pub sync_interval_hours: i32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<String>,
    pub events_last_sync: Option<i32>,
    pub dates_last_sync: Option<i32>,
    pub last_error_message: Option<String>,
}

impl From<DbCalendarConfig> for CalendarConfig {
    fn from(row: DbCalendarConfig) -> Self {
        Self {
            id: row.id,
            room_id: row.room_id,
            platform: row.platform,
            feed_url: row.feed_url,
            active: row.active,
            sync_interval_hours: row.sync_interval_hours,
            last_sync_at: row.last_sync_at,
            last_sync_status: row.last_sync_status,
            events_last_sync: row.events_last_sync,
            dates_last_sync: row.dates_last_sync,
            last_error_message: row.last_error_message,
        }
    }
}
