use std::collections::HashMap;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use shared::*;
use uuid::Uuid;

use crate::store::AvailabilityStore;

/// Bounds applied to administrative price overrides. Computed stay
/// prices always resolve to a concrete rate and are never bounded.
#[derive(Debug, Clone)]
pub struct PricingLimits {
    pub min: BigDecimal,
    pub max: BigDecimal,
}

impl Default for PricingLimits {
    fn default() -> Self {
        Self {
            min: BigDecimal::from(10),
            max: BigDecimal::from(1000),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StayQuote {
    pub nights: i64,
    pub room_total: BigDecimal,
    pub cleaning_fee: BigDecimal,
    pub total: BigDecimal,
    /// Room cost divided by night count, for display.
    pub average_night: BigDecimal,
}

/// Date-keyed dynamic pricing: override, then seasonal rate, then base.
pub struct PricingResolver<S> {
    store: Arc<S>,
    season: HighSeason,
    limits: PricingLimits,
}

impl<S: AvailabilityStore> PricingResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            season: HighSeason::default(),
            limits: PricingLimits::default(),
        }
    }

    pub fn with_season(mut self, season: HighSeason) -> Self {
        self.season = season;
        self
    }

    pub fn with_limits(mut self, limits: PricingLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Pure per-night resolution. Overrides only count on available
    /// rows: a blocked date is never charged, so its override is noise.
    fn resolve(&self, room: &Room, date: NaiveDate, record: Option<&AvailabilityRecord>) -> BigDecimal {
        if let Some(record) = record {
            if record.is_available {
                if let Some(ref price) = record.price_override {
                    return price.clone();
                }
            }
        }
        if self.season.contains(date) {
            room.high_season_price.clone()
        } else {
            room.base_price.clone()
        }
    }

    pub async fn price_for_night(&self, room: &Room, date: NaiveDate) -> Result<BigDecimal, Error> {
        let records = self
            .store
            .availability_in(room.id, date, date.succ_opt().unwrap_or(date))
            .await?;
        Ok(self.resolve(room, date, records.first()))
    }

    /// Per-stay totals: summed nightly rates plus the flat cleaning fee
    /// applied once.
    pub async fn quote_stay(&self, room: &Room, stay: &StayRange) -> Result<StayQuote, Error> {
        let records = self
            .store
            .availability_in(room.id, stay.check_in(), stay.check_out())
            .await?;
        let by_date: HashMap<NaiveDate, &AvailabilityRecord> =
            records.iter().map(|r| (r.date, r)).collect();

        let mut room_total = BigDecimal::from(0);
        for night in stay.nights() {
            room_total += self.resolve(room, night, by_date.get(&night).copied());
        }

        let nights = stay.night_count();
        let average_night = room_total.clone() / BigDecimal::from(nights);
        let total = room_total.clone() + room.cleaning_fee.clone();
        Ok(StayQuote {
            nights,
            room_total,
            cleaning_fee: room.cleaning_fee.clone(),
            total,
            average_night,
        })
    }

    fn validate_override(&self, amount: &BigDecimal) -> Result<(), Error> {
        if *amount < self.limits.min || *amount > self.limits.max {
            return Err(Error::PriceOutOfRange {
                amount: amount.clone(),
                min: self.limits.min.clone(),
                max: self.limits.max.clone(),
            });
        }
        Ok(())
    }

    /// Admin operation: pin a nightly rate for one date. The date stays
    /// available; only the rate changes.
    pub async fn set_price_override(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        amount: BigDecimal,
    ) -> Result<(), Error> {
        self.validate_override(&amount)?;
        self.store
            .upsert_availability(vec![AvailabilityRecord {
                id: Uuid::new_v4(),
                room_id,
                date,
                is_available: true,
                price_override: Some(amount),
                block_type: BlockType::Full,
                sync_source: None,
            }])
            .await
    }

    /// Admin operation: block one date manually. Manual rows carry no
    /// sync source, so calendar syncs never disturb them.
    pub async fn set_block(
        &self,
        room_id: Uuid,
        date: NaiveDate,
        block_type: BlockType,
    ) -> Result<(), Error> {
        self.store
            .upsert_availability(vec![AvailabilityRecord {
                id: Uuid::new_v4(),
                room_id,
                date,
                is_available: false,
                price_override: None,
                block_type,
                sync_source: None,
            }])
            .await
    }

    /// Admin operation: drop any override or block on one date.
    pub async fn clear_date(&self, room_id: Uuid, date: NaiveDate) -> Result<(), Error> {
        self.store.clear_date(room_id, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn room() -> Room {
        Room {
            id: Uuid::new_v4(),
            name: "Seaview".to_string(),
            capacity: 2,
            base_price: BigDecimal::from(95),
            high_season_price: BigDecimal::from(120),
            cleaning_fee: BigDecimal::from(0),
            minimum_stay: 1,
        }
    }

    #[tokio::test]
    async fn high_season_rate_applies_in_july() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PricingResolver::new(store);
        let price = resolver
            .price_for_night(&room(), date(2024, 7, 15))
            .await
            .unwrap();
        assert_eq!(price, BigDecimal::from(120));
    }

    #[tokio::test]
    async fn base_rate_applies_in_march() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PricingResolver::new(store);
        let price = resolver
            .price_for_night(&room(), date(2024, 3, 15))
            .await
            .unwrap();
        assert_eq!(price, BigDecimal::from(95));
    }

    #[tokio::test]
    async fn override_beats_season() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PricingResolver::new(store.clone());
        let room = room();
        resolver
            .set_price_override(room.id, date(2024, 7, 15), BigDecimal::from(150))
            .await
            .unwrap();
        let price = resolver
            .price_for_night(&room, date(2024, 7, 15))
            .await
            .unwrap();
        assert_eq!(price, BigDecimal::from(150));
    }

    #[tokio::test]
    async fn override_on_blocked_date_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PricingResolver::new(store.clone());
        let room = room();
        store
            .upsert_availability(vec![AvailabilityRecord {
                id: Uuid::new_v4(),
                room_id: room.id,
                date: date(2024, 7, 15),
                is_available: false,
                price_override: Some(BigDecimal::from(150)),
                block_type: BlockType::Full,
                sync_source: None,
            }])
            .await
            .unwrap();
        let price = resolver
            .price_for_night(&room, date(2024, 7, 15))
            .await
            .unwrap();
        assert_eq!(price, BigDecimal::from(120));
    }

    #[tokio::test]
    async fn quote_sums_nights_and_adds_cleaning_fee_once() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PricingResolver::new(store);
        let mut room = room();
        room.cleaning_fee = BigDecimal::from(40);
        // two low-season nights
        let stay = StayRange::new(date(2024, 3, 10), date(2024, 3, 12)).unwrap();
        let quote = resolver.quote_stay(&room, &stay).await.unwrap();
        assert_eq!(quote.nights, 2);
        assert_eq!(quote.room_total, BigDecimal::from(190));
        assert_eq!(quote.total, BigDecimal::from(230));
        assert_eq!(quote.average_night, BigDecimal::from(95));
    }

    #[tokio::test]
    async fn override_outside_bounds_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let resolver = PricingResolver::new(store);
        let err = resolver
            .set_price_override(Uuid::new_v4(), date(2024, 7, 15), BigDecimal::from(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PriceOutOfRange { .. }));
        let err = resolver
            .set_price_override(Uuid::new_v4(), date(2024, 7, 15), BigDecimal::from(2000))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PriceOutOfRange { .. }));
    }
}
