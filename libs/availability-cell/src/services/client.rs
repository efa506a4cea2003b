use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use tracing::debug;

use shared_api::{ApiError, RestClient};
use shared_config::AppConfig;
use shared_models::auth::{PractitionerProfile, TokenProvider};

use crate::error::AvailabilityError;
use crate::models::{
    wire_time, AvailabilityFilters, AvailabilityRule, AvailabilityUpdate, BulkAvailabilityRequest,
    BulkCreateResponse, NewAvailabilityRule, PractitionerId, RuleId, SlotCheck, TimeSlot,
};

type Result<T> = std::result::Result<T, AvailabilityError>;

/// One remote call per availability operation. No local state.
#[derive(Clone)]
pub struct AvailabilityClient {
    api: RestClient,
}

impl AvailabilityClient {
    pub fn new(config: &AppConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            api: RestClient::new(config, tokens),
        }
    }

    /// List the signed-in practitioner's own rules in server order.
    pub async fn get_mine(&self, filters: Option<&AvailabilityFilters>) -> Result<Vec<AvailabilityRule>> {
        let query = filters.map(AvailabilityFilters::to_query).unwrap_or_default();
        debug!("Fetching own availability with {} filters", query.len());

        let rules: Vec<AvailabilityRule> = self.api.get("/availability/", &query).await?;
        Ok(rules)
    }

    pub async fn get_one(&self, id: RuleId) -> Result<AvailabilityRule> {
        let rule = self.api.get(&format!("/availability/{}/", id), &[]).await?;
        Ok(rule)
    }

    pub async fn create(&self, rule: &NewAvailabilityRule) -> Result<AvailabilityRule> {
        debug!("Creating {} availability rule", rule.recurrence().kind());

        let created: AvailabilityRule = self
            .api
            .post("/availability/", serde_json::to_value(rule).map_err(ApiError::from)?)
            .await?;
        debug!("Availability rule created with ID: {}", created.id);
        Ok(created)
    }

    pub async fn update(&self, id: RuleId, update: &AvailabilityUpdate) -> Result<AvailabilityRule> {
        update.validate()?;
        debug!("Updating availability rule: {}", id);

        let updated = self
            .api
            .put(
                &format!("/availability/{}/", id),
                serde_json::to_value(update).map_err(ApiError::from)?,
            )
            .await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: RuleId) -> Result<()> {
        debug!("Deleting availability rule: {}", id);
        self.api.delete(&format!("/availability/{}/", id)).await?;
        Ok(())
    }

    /// Create one weekly rule per selected weekday. Whatever the server
    /// returns is taken as the outcome, even if shorter than the request.
    pub async fn bulk_create(&self, request: &BulkAvailabilityRequest) -> Result<Vec<AvailabilityRule>> {
        request.validate()?;
        debug!(
            "Bulk creating availability for {} days for practitioner {}",
            request.days_of_week.len(),
            request.practitioner
        );

        let response: BulkCreateResponse = self
            .api
            .post(
                "/availability/bulk-create/",
                serde_json::to_value(request).map_err(ApiError::from)?,
            )
            .await?;

        if response.slots.len() != request.days_of_week.len() {
            debug!(
                "Bulk create returned {} of {} requested rules",
                response.slots.len(),
                request.days_of_week.len()
            );
        }
        Ok(response.slots)
    }

    /// Bookable slots within the inclusive date range. Empty means no availability.
    pub async fn get_practitioner_slots(
        &self,
        practitioner_id: PractitionerId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<TimeSlot>> {
        debug!(
            "Fetching slots for practitioner {} from {} to {}",
            practitioner_id, start_date, end_date
        );

        let query = [
            ("start_date", start_date.format("%Y-%m-%d").to_string()),
            ("end_date", end_date.format("%Y-%m-%d").to_string()),
        ];
        let slots = self
            .api
            .get(&format!("/practitioners/{}/available-slots/", practitioner_id), &query)
            .await?;
        Ok(slots)
    }

    /// Ask whether a single date/time is bookable right now. Reserves nothing.
    pub async fn check_slot(
        &self,
        practitioner_id: PractitionerId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<SlotCheck> {
        let body = json!({
            "practitioner": practitioner_id,
            "date": date.format("%Y-%m-%d").to_string(),
            "time": time.format(wire_time::WIRE_FORMAT).to_string(),
        });
        let check = self.api.post("/availability/check-slot/", body).await?;
        Ok(check)
    }

    /// Public read of another practitioner's rules, for display.
    pub async fn get_practitioner_availability(
        &self,
        practitioner_id: PractitionerId,
    ) -> Result<Vec<AvailabilityRule>> {
        let rules = self
            .api
            .get(&format!("/practitioners/{}/availability/", practitioner_id), &[])
            .await?;
        Ok(rules)
    }

    /// The signed-in user's practitioner profile, `None` when they have none.
    pub async fn get_my_profile(&self) -> Result<Option<PractitionerProfile>> {
        match self.api.get::<PractitionerProfile>("/practitioners/me/", &[]).await {
            Ok(profile) => Ok(Some(profile)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
