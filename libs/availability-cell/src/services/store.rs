use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

use shared_models::auth::PractitionerProfile;

use crate::error::AvailabilityError;
use crate::models::{
    AvailabilityFilters, AvailabilityRule, AvailabilityUpdate, BulkAvailabilityRequest, NewAvailabilityRule,
    PractitionerId, RuleId, SlotCheck, TimeSlot,
};
use crate::services::client::AvailabilityClient;

type Result<T> = std::result::Result<T, AvailabilityError>;

#[derive(Debug, Default)]
struct StoreState {
    rules: Vec<AvailabilityRule>,
    slots: Vec<TimeSlot>,
    error: Option<String>,
}

/// Slots returned by [`AvailabilityStore::fetch_time_slots`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedSlots {
    pub slots: Vec<TimeSlot>,
    /// A newer slot query was issued before this one resolved; the store
    /// kept the newer state and callers should ignore these slots.
    pub stale: bool,
}

// Decrements the in-flight count on every exit path.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        LoadingGuard(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client-side state for one screen: the current rule list and the slot
/// list for the last queried range.
///
/// List fetches replace local state wholesale. Single-item writes patch the
/// local list with the entity the server echoed back.
pub struct AvailabilityStore {
    client: AvailabilityClient,
    state: RwLock<StoreState>,
    in_flight: AtomicUsize,
    slot_generation: AtomicU64,
}

impl AvailabilityStore {
    pub fn new(client: AvailabilityClient) -> Self {
        Self {
            client,
            state: RwLock::new(StoreState::default()),
            in_flight: AtomicUsize::new(0),
            slot_generation: AtomicU64::new(0),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn rules(&self) -> Vec<AvailabilityRule> {
        self.read().rules.clone()
    }

    pub fn slots(&self) -> Vec<TimeSlot> {
        self.read().slots.clone()
    }

    /// Message from the most recent failed read, if any.
    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    fn record_read_failure(&self, err: &AvailabilityError) {
        warn!("Availability read failed: {}", err);
        self.write().error = Some(err.user_message());
    }

    fn replace_rules(&self, rules: Vec<AvailabilityRule>) {
        let mut state = self.write();
        debug!("Replacing {} local rules with {}", state.rules.len(), rules.len());
        state.rules = rules;
        state.error = None;
    }

    /// The signed-in user's practitioner profile; `None` when they have none.
    pub async fn fetch_my_profile(&self) -> Result<Option<PractitionerProfile>> {
        let _loading = LoadingGuard::start(&self.in_flight);
        self.client.get_my_profile().await
    }

    pub async fn fetch_my_availability(
        &self,
        filters: Option<&AvailabilityFilters>,
    ) -> Result<Vec<AvailabilityRule>> {
        let _loading = LoadingGuard::start(&self.in_flight);

        match self.client.get_mine(filters).await {
            Ok(rules) => {
                self.replace_rules(rules.clone());
                Ok(rules)
            }
            Err(err) => {
                self.record_read_failure(&err);
                Err(err)
            }
        }
    }

    pub async fn fetch_practitioner_availability(
        &self,
        practitioner_id: PractitionerId,
    ) -> Result<Vec<AvailabilityRule>> {
        let _loading = LoadingGuard::start(&self.in_flight);

        match self.client.get_practitioner_availability(practitioner_id).await {
            Ok(rules) => {
                self.replace_rules(rules.clone());
                Ok(rules)
            }
            Err(err) => {
                self.record_read_failure(&err);
                Err(err)
            }
        }
    }

    /// Query bookable slots for a date range and make them the current slot list.
    ///
    /// Only the most recently issued query may change state. A query that
    /// resolves after a newer one was issued comes back `stale`, whether it
    /// succeeded or failed.
    pub async fn fetch_time_slots(
        &self,
        practitioner_id: PractitionerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<FetchedSlots> {
        let _loading = LoadingGuard::start(&self.in_flight);
        let generation = self.slot_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let outcome = self
            .client
            .get_practitioner_slots(practitioner_id, start_date, end_date)
            .await;

        if generation != self.slot_generation.load(Ordering::SeqCst) {
            debug!(
                "Discarding slot response for {}..{} (generation {} superseded)",
                start_date, end_date, generation
            );
            return Ok(FetchedSlots {
                slots: Vec::new(),
                stale: true,
            });
        }

        match outcome {
            Ok(slots) => {
                let mut state = self.write();
                state.slots = slots.clone();
                state.error = None;
                Ok(FetchedSlots { slots, stale: false })
            }
            Err(err) => {
                self.record_read_failure(&err);
                Err(err)
            }
        }
    }

    pub async fn create_slot(&self, rule: &NewAvailabilityRule) -> Result<AvailabilityRule> {
        let _loading = LoadingGuard::start(&self.in_flight);

        let created = self.client.create(rule).await?;
        self.write().rules.push(created.clone());
        Ok(created)
    }

    pub async fn bulk_create_slots(&self, request: &BulkAvailabilityRequest) -> Result<Vec<AvailabilityRule>> {
        let _loading = LoadingGuard::start(&self.in_flight);

        let created = self.client.bulk_create(request).await?;
        self.write().rules.extend(created.iter().cloned());
        Ok(created)
    }

    pub async fn update_slot(&self, id: RuleId, update: &AvailabilityUpdate) -> Result<AvailabilityRule> {
        let _loading = LoadingGuard::start(&self.in_flight);

        let updated = self.client.update(id, update).await?;

        let mut state = self.write();
        match state.rules.iter().position(|rule| rule.id == id) {
            Some(index) => {
                state.rules[index] = updated.clone();
                let mut seen = false;
                state.rules.retain(|rule| {
                    if rule.id != id {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => state.rules.push(updated.clone()),
        }
        Ok(updated)
    }

    pub async fn delete_slot(&self, id: RuleId) -> Result<()> {
        let _loading = LoadingGuard::start(&self.in_flight);

        self.client.delete(id).await?;
        self.write().rules.retain(|rule| rule.id != id);
        Ok(())
    }

    /// Never fails: transport or API errors become a negative result
    /// carrying the failure as its reason.
    pub async fn check_slot_availability(
        &self,
        practitioner_id: PractitionerId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> SlotCheck {
        let _loading = LoadingGuard::start(&self.in_flight);

        match self.client.check_slot(practitioner_id, date, time).await {
            Ok(check) => check,
            Err(err) => {
                warn!("Slot check failed for {} {}: {}", date, time, err);
                SlotCheck::unavailable(err.to_string())
            }
        }
    }
}
