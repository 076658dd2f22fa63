use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("check-out must be strictly after check-in")]
    InvalidRange,
    #[error("nightly rate {amount} outside allowed range {min}..={max}")]
    PriceOutOfRange {
        amount: BigDecimal,
        min: BigDecimal,
        max: BigDecimal,
    },
    #[error("feed download failed: {0}")]
    Download(String),
    #[error("room {0} not found")]
    RoomNotFound(Uuid),
    #[error("booking {0} not found")]
    BookingNotFound(Uuid),
    #[error("booking {0} overlaps an existing confirmed booking")]
    ConfirmConflict(Uuid),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    AwaitingPayment,
    Confirmed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::AwaitingPayment => "awaiting_payment",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "awaiting_payment" => Some(BookingStatus::AwaitingPayment),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "refunded" => Some(BookingStatus::Refunded),
            _ => None,
        }
    }
}

/// Why a calendar date is unavailable. Every variant blocks night
/// occupation; the variant only changes the human-readable reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Full,
    PrepBefore,
    BookingGuest,
    AirbnbGuest,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Full => "full",
            BlockType::PrepBefore => "prep_before",
            BlockType::BookingGuest => "booking_guest",
            BlockType::AirbnbGuest => "airbnb_guest",
        }
    }

    /// Unknown values from storage fall back to a full closure.
    pub fn parse(s: &str) -> Self {
        match s {
            "prep_before" => BlockType::PrepBefore,
            "booking_guest" => BlockType::BookingGuest,
            "airbnb_guest" => BlockType::AirbnbGuest,
            _ => BlockType::Full,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            BlockType::PrepBefore => "preparation block",
            BlockType::BookingGuest => "guest reservation",
            _ => "external calendar block",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub base_price: BigDecimal,
    pub high_season_price: BigDecimal,
    pub cleaning_fee: BigDecimal,
    pub minimum_stay: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
    pub guest_name: String,
    pub guest_email: String,
    pub total_price: BigDecimal,
    pub total_nights: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row per (room, date) at most. A missing row means the date is
/// available at the base or seasonal rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub id: Uuid,
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub is_available: bool,
    pub price_override: Option<BigDecimal>,
    pub block_type: BlockType,
    pub sync_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
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

/// A validated half-open stay: `[check_in, check_out)`. The check-out
/// date is never a night, so it stays free for a same-day arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, Error> {
        if check_out <= check_in {
            return Err(Error::InvalidRange);
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Every night-start date occupied by this stay, in order.
    pub fn nights(&self) -> impl Iterator<Item = NaiveDate> {
        let check_out = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < check_out)
    }

    pub fn night_count(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Conflict {
    MinimumStay {
        nights: i64,
        required: i64,
    },
    Booking {
        booking_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    Blocked {
        date: NaiveDate,
        reason: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityReport {
    pub available: bool,
    pub conflicts: Vec<Conflict>,
}

/// Inclusive month range during which the high-season rate applies.
#[derive(Debug, Clone, Copy)]
pub struct HighSeason {
    pub start_month: u32,
    pub end_month: u32,
}

impl Default for HighSeason {
    fn default() -> Self {
        Self {
            start_month: 6,
            end_month: 9,
        }
    }
}

impl HighSeason {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let month = date.month();
        if self.start_month <= self.end_month {
            month >= self.start_month && month <= self.end_month
        } else {
            // wraps over the new year, e.g. Dec..Feb
            month >= self.start_month || month <= self.end_month
        }
    }
}

/// How one external calendar event translates into blocked dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStrategy {
    pub block_type: BlockType,
    /// Keep every calendar day of the event span, including the day a
    /// night-based reading would treat as checkout.
    pub covers_all_days: bool,
    /// Booking.com convention: the exported start date is already a
    /// checkout day elsewhere, so drop the first day of the span too.
    pub same_day_turnover: bool,
}

struct ClassificationRule {
    /// Every needle must appear (case-insensitive) in the summary.
    needles: &'static [&'static str],
    strategy: BlockStrategy,
}

/// Platform conventions, matched in order, first match wins. This is
/// configuration data: new platforms get a new row, not new code.
const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    // Airbnb pre-arrival buffer ("Airbnb (Not available)")
    ClassificationRule {
        needles: &["airbnb", "not available"],
        strategy: BlockStrategy {
            block_type: BlockType::PrepBefore,
            covers_all_days: true,
            same_day_turnover: false,
        },
    },
    // Regular Airbnb guest booking
    ClassificationRule {
        needles: &["airbnb"],
        strategy: BlockStrategy {
            block_type: BlockType::Full,
            covers_all_days: false,
            same_day_turnover: false,
        },
    },
    // Booking.com export conventions
    ClassificationRule {
        needles: &["closed - not available"],
        strategy: BlockStrategy {
            block_type: BlockType::Full,
            covers_all_days: false,
            same_day_turnover: true,
        },
    },
    ClassificationRule {
        needles: &["booking"],
        strategy: BlockStrategy {
            block_type: BlockType::Full,
            covers_all_days: false,
            same_day_turnover: true,
        },
    },
    // Administrative closures block every day of the span
    ClassificationRule {
        needles: &["maintenance"],
        strategy: BlockStrategy {
            block_type: BlockType::Full,
            covers_all_days: true,
            same_day_turnover: false,
        },
    },
    ClassificationRule {
        needles: &["blocked"],
        strategy: BlockStrategy {
            block_type: BlockType::Full,
            covers_all_days: true,
            same_day_turnover: false,
        },
    },
];

/// Conservative default: treat an unrecognized event as a night-based
/// guest booking.
const DEFAULT_STRATEGY: BlockStrategy = BlockStrategy {
    block_type: BlockType::Full,
    covers_all_days: false,
    same_day_turnover: false,
};

/// Decide a blocking strategy from a free-text event summary.
pub fn classify_summary(summary: &str) -> BlockStrategy {
    let lowered = summary.to_lowercase();
    for rule in CLASSIFICATION_RULES {
        if rule.needles.iter().all(|n| lowered.contains(n)) {
            return rule.strategy;
        }
    }
    DEFAULT_STRATEGY
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced { events: usize, blocked_dates: usize },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSyncResult {
    pub config_id: Uuid,
    pub room_id: Uuid,
    pub platform: String,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SyncReport {
    pub total_configs: usize,
    pub successful_syncs: usize,
    pub failed_syncs: usize,
    pub results: Vec<RoomSyncResult>,
}

impl SyncReport {
    pub fn record(&mut self, result: RoomSyncResult) {
        match result.outcome {
            SyncOutcome::Synced { .. } => self.successful_syncs += 1,
            SyncOutcome::Failed { .. } => self.failed_syncs += 1,
        }
        self.results.push(result);
    }
}
