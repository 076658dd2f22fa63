use std::sync::Arc;

use chrono::NaiveDate;
use shared::*;

use crate::store::AvailabilityStore;

/// Answers "can this stay be booked" against confirmed bookings and
/// blocked dates. Advisory at check time; the store's confirmation
/// constraint has the final word.
pub struct ConflictChecker<S> {
    store: Arc<S>,
}

impl<S: AvailabilityStore> ConflictChecker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn check(
        &self,
        room: &Room,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<AvailabilityReport, Error> {
        let stay = StayRange::new(check_in, check_out)?;

        // Too-short stays short-circuit: the caller only needs this one
        // signal, so no further queries run.
        let nights = stay.night_count();
        if nights < i64::from(room.minimum_stay) {
            return Ok(AvailabilityReport {
                available: false,
                conflicts: vec![Conflict::MinimumStay {
                    nights,
                    required: i64::from(room.minimum_stay),
                }],
            });
        }

        let mut conflicts = Vec::new();

        for booking in self
            .store
            .bookings_overlapping(room.id, &stay, BookingStatus::Confirmed)
            .await?
        {
            conflicts.push(Conflict::Booking {
                booking_id: booking.id,
                check_in: booking.check_in,
                check_out: booking.check_out,
            });
        }

        let records = self
            .store
            .availability_in(room.id, stay.check_in(), stay.check_out())
            .await?;
        for record in records.iter().filter(|r| !r.is_available) {
            // Same-day handover: a departing guest's reservation block
            // on the arrival date does not stop a new check-in.
            if record.date == stay.check_in() && record.block_type == BlockType::BookingGuest {
                continue;
            }
            conflicts.push(Conflict::Blocked {
                date: record.date,
                reason: record.block_type.reason().to_string(),
            });
        }

        Ok(AvailabilityReport {
            available: conflicts.is_empty(),
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::AvailabilityStore;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn room(minimum_stay: i32) -> Room {
        Room {
            id: Uuid::new_v4(),
            name: "Garden".to_string(),
            capacity: 4,
            base_price: BigDecimal::from(95),
            high_season_price: BigDecimal::from(120),
            cleaning_fee: BigDecimal::from(0),
            minimum_stay,
        }
    }

    fn booking(room_id: Uuid, check_in: NaiveDate, check_out: NaiveDate, status: BookingStatus) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            room_id,
            check_in,
            check_out,
            status,
            guest_name: "Guest".to_string(),
            guest_email: "guest@example.com".to_string(),
            total_price: BigDecimal::from(0),
            total_nights: (check_out - check_in).num_days() as i32,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn blocked(room_id: Uuid, date: NaiveDate, block_type: BlockType) -> AvailabilityRecord {
        AvailabilityRecord {
            id: Uuid::new_v4(),
            room_id,
            date,
            is_available: false,
            price_override: None,
            block_type,
            sync_source: None,
        }
    }

    #[tokio::test]
    async fn empty_calendar_is_available() {
        let store = Arc::new(MemoryStore::new());
        let checker = ConflictChecker::new(store);
        let report = checker
            .check(&room(1), date(2024, 6, 7), date(2024, 6, 11))
            .await
            .unwrap();
        assert!(report.available);
        assert!(report.conflicts.is_empty());
    }

    #[tokio::test]
    async fn invalid_range_is_an_error_not_a_conflict() {
        let store = Arc::new(MemoryStore::new());
        let checker = ConflictChecker::new(store);
        let err = checker
            .check(&room(1), date(2024, 6, 11), date(2024, 6, 11))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRange));
    }

    #[tokio::test]
    async fn minimum_stay_short_circuits_other_checks() {
        let store = Arc::new(MemoryStore::new());
        let room = room(3);
        // a booking that would also conflict, to prove it goes unreported
        store
            .insert_booking(&booking(
                room.id,
                date(2024, 6, 7),
                date(2024, 6, 9),
                BookingStatus::Confirmed,
            ))
            .await
            .unwrap();
        let checker = ConflictChecker::new(store);
        let report = checker
            .check(&room, date(2024, 6, 7), date(2024, 6, 9))
            .await
            .unwrap();
        assert!(!report.available);
        assert_eq!(
            report.conflicts,
            vec![Conflict::MinimumStay {
                nights: 2,
                required: 3
            }]
        );
    }

    #[tokio::test]
    async fn confirmed_booking_blocks_nights_but_checkout_day_stays_open() {
        let store = Arc::new(MemoryStore::new());
        let room = room(1);
        store
            .insert_booking(&booking(
                room.id,
                date(2024, 6, 7),
                date(2024, 6, 11),
                BookingStatus::Confirmed,
            ))
            .await
            .unwrap();
        let checker = ConflictChecker::new(store);

        // overlapping the stay conflicts
        let report = checker
            .check(&room, date(2024, 6, 10), date(2024, 6, 12))
            .await
            .unwrap();
        assert!(!report.available);
        assert_eq!(report.conflicts.len(), 1);

        // arriving on the checkout day does not
        let report = checker
            .check(&room, date(2024, 6, 11), date(2024, 6, 13))
            .await
            .unwrap();
        assert!(report.available);
    }

    #[tokio::test]
    async fn awaiting_payment_bookings_do_not_occupy_nights() {
        let store = Arc::new(MemoryStore::new());
        let room = room(1);
        store
            .insert_booking(&booking(
                room.id,
                date(2024, 6, 7),
                date(2024, 6, 11),
                BookingStatus::AwaitingPayment,
            ))
            .await
            .unwrap();
        let checker = ConflictChecker::new(store);
        let report = checker
            .check(&room, date(2024, 6, 8), date(2024, 6, 10))
            .await
            .unwrap();
        assert!(report.available);
    }

    #[tokio::test]
    async fn conflicts_accumulate_without_deduplication() {
        let store = Arc::new(MemoryStore::new());
        let room = room(1);
        store
            .insert_booking(&booking(
                room.id,
                date(2024, 6, 8),
                date(2024, 6, 9),
                BookingStatus::Confirmed,
            ))
            .await
            .unwrap();
        store
            .upsert_availability(vec![
                blocked(room.id, date(2024, 6, 9), BlockType::Full),
                blocked(room.id, date(2024, 6, 10), BlockType::PrepBefore),
            ])
            .await
            .unwrap();
        let checker = ConflictChecker::new(store);
        let report = checker
            .check(&room, date(2024, 6, 7), date(2024, 6, 12))
            .await
            .unwrap();
        assert!(!report.available);
        assert_eq!(report.conflicts.len(), 3);
        let blocked_reasons: Vec<_> = report
            .conflicts
            .iter()
            .filter_map(|c| match c {
                Conflict::Blocked { reason, .. } => Some(reason.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            blocked_reasons,
            vec!["external calendar block", "preparation block"]
        );
    }

    #[tokio::test]
    async fn guest_reservation_block_on_arrival_date_allows_handover() {
        let store = Arc::new(MemoryStore::new());
        let room = room(1);
        store
            .upsert_availability(vec![blocked(
                room.id,
                date(2024, 6, 11),
                BlockType::BookingGuest,
            )])
            .await
            .unwrap();
        let checker = ConflictChecker::new(store);

        // arriving the day the departing guest leaves is fine
        let report = checker
            .check(&room, date(2024, 6, 11), date(2024, 6, 13))
            .await
            .unwrap();
        assert!(report.available);

        // the same block mid-stay still conflicts
        let report = checker
            .check(&room, date(2024, 6, 10), date(2024, 6, 13))
            .await
            .unwrap();
        assert!(!report.available);
    }
}
