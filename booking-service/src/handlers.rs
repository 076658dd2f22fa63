use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::*;
use tracing::info;
use uuid::Uuid;

use crate::conflicts::ConflictChecker;
use crate::pricing::{PricingResolver, StayQuote};
use crate::store::AvailabilityStore;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBookingRequest {
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_name: String,
    pub guest_email: String,
}

/// Outcome of a booking attempt. A rejected attempt is a normal
/// result: the conflicts are data for the caller, not an error.
#[derive(Debug)]
pub enum BookingAttempt {
    Created(Booking),
    Rejected(AvailabilityReport),
}

/// Front door of the engine: availability checks, quotes, booking
/// creation and payment-authority outcomes, plus the admin date
/// operations.
pub struct BookingManager<S> {
    store: Arc<S>,
    checker: ConflictChecker<S>,
    pricing: PricingResolver<S>,
}

impl<S: AvailabilityStore> BookingManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            checker: ConflictChecker::new(store.clone()),
            pricing: PricingResolver::new(store.clone()),
            store,
        }
    }

    pub async fn check_availability(
        &self,
        room_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<AvailabilityReport, Error> {
        let room = self.store.room(room_id).await?;
        self.checker.check(&room, check_in, check_out).await
    }

    pub async fn quote(
        &self,
        room_id: Uuid,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<StayQuote, Error> {
        let room = self.store.room(room_id).await?;
        let stay = StayRange::new(check_in, check_out)?;
        self.pricing.quote_stay(&room, &stay).await
    }

    /// Create a booking in `awaiting_payment` if the stay is clear.
    /// The check is advisory; the store's confirmation step has the
    /// final word once payment succeeds.
    pub async fn create_booking(&self, request: NewBookingRequest) -> Result<BookingAttempt, Error> {
        let room = self.store.room(request.room_id).await?;
        let report = self
            .checker
            .check(&room, request.check_in, request.check_out)
            .await?;
        if !report.available {
            return Ok(BookingAttempt::Rejected(report));
        }

        let stay = StayRange::new(request.check_in, request.check_out)?;
        let quote = self.pricing.quote_stay(&room, &stay).await?;
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            room_id: room.id,
            check_in: request.check_in,
            check_out: request.check_out,
            status: BookingStatus::AwaitingPayment,
            guest_name: request.guest_name,
            guest_email: request.guest_email,
            total_price: quote.total,
            total_nights: quote.nights as i32,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_booking(&booking).await?;
        info!(
            "created booking {} for room {} ({} nights, awaiting payment)",
            booking.id, booking.room_id, booking.total_nights
        );
        Ok(BookingAttempt::Created(booking))
    }

    /// Consume a payment-authority report. This engine never initiates
    /// payment; it only reacts to the outcome.
    pub async fn apply_payment_outcome(
        &self,
        booking_id: Uuid,
        outcome: PaymentOutcome,
    ) -> Result<Booking, Error> {
        let booking = match outcome {
            PaymentOutcome::Succeeded => self.store.confirm_booking(booking_id).await?,
            PaymentOutcome::Failed => {
                self.store
                    .set_booking_status(
                        booking_id,
                        BookingStatus::AwaitingPayment,
                        BookingStatus::Cancelled,
                    )
                    .await?
            }
            PaymentOutcome::Refunded => {
                self.store
                    .set_booking_status(
                        booking_id,
                        BookingStatus::Confirmed,
                        BookingStatus::Refunded,
                    )
                    .await?
            }
        };
        info!(
            "booking {} is now {}",
            booking.id,
            booking.status.as_str()
        );
        Ok(booking)
    }

    pub async fn booking(&self, id: Uuid) -> Result<Booking, Error> {
        self.store.booking(id).await
    }

    pub async fn set_price_override(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        amount: bigdecimal::BigDecimal,
    ) -> Result<(), Error> {
        self.store.room(room_id).await?;
        self.pricing.set_price_override(room_id, date, amount).await
    }

    pub async fn set_block(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        block_type: BlockType,
    ) -> Result<(), Error> {
        self.store.room(room_id).await?;
        self.pricing.set_block(room_id, date, block_type).await
    }

    pub async fn clear_date(&self, room_id: Uuid, date: NaiveDate) -> Result<(), Error> {
        self.pricing.clear_date(room_id, date).await
    }
}
