use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use shared_models::auth::PractitionerProfile;

use crate::error::AvailabilityError;
use crate::models::{
    wire_time, AvailabilityRule, AvailabilityUpdate, BulkAvailabilityRequest, DayOfWeek, NewAvailabilityRule,
    PractitionerId, Recurrence, RecurrenceKind, RuleError, RuleId,
};
use crate::services::clock::Clock;
use crate::services::notify::{Notice, Notifier, Severity};
use crate::services::store::AvailabilityStore;

type Result<T> = std::result::Result<T, AvailabilityError>;

fn default_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn default_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn notes_value(notes: &str) -> Option<String> {
    let trimmed = notes.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Single-rule form. Which anchor field is used depends on `recurrence_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleForm {
    pub recurrence_type: RecurrenceKind,
    pub day_of_week: DayOfWeek,
    pub specific_date: NaiveDate,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(with = "wire_time")]
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub notes: String,
}

impl RuleForm {
    pub fn blank(today: NaiveDate) -> Self {
        Self {
            recurrence_type: RecurrenceKind::Weekly,
            day_of_week: DayOfWeek::MONDAY,
            specific_date: today,
            start_time: default_start(),
            end_time: default_end(),
            is_available: true,
            notes: String::new(),
        }
    }

    /// Pre-populate from an existing rule; the unused anchor keeps `today`/Monday.
    pub fn from_rule(rule: &AvailabilityRule, today: NaiveDate) -> Self {
        Self {
            recurrence_type: rule.kind(),
            day_of_week: rule.recurrence.day_of_week().unwrap_or(DayOfWeek::MONDAY),
            specific_date: rule.recurrence.specific_date().unwrap_or(today),
            start_time: rule.start_time,
            end_time: rule.end_time,
            is_available: rule.is_available,
            notes: rule.notes.clone().unwrap_or_default(),
        }
    }

    /// Overwrite the form with a complete rule, keeping the unused anchor.
    pub fn fill_from(&mut self, rule: &NewAvailabilityRule) {
        let recurrence = rule.recurrence();
        self.recurrence_type = recurrence.kind();
        if let Some(day) = recurrence.day_of_week() {
            self.day_of_week = day;
        }
        if let Some(date) = recurrence.specific_date() {
            self.specific_date = date;
        }
        self.start_time = rule.start_time();
        self.end_time = rule.end_time();
        self.is_available = rule.is_available();
        self.notes = rule.notes().unwrap_or_default().to_string();
    }

    pub fn recurrence(&self) -> Recurrence {
        match self.recurrence_type {
            RecurrenceKind::Weekly => Recurrence::Weekly(self.day_of_week),
            RecurrenceKind::OneTime => Recurrence::OneTime(self.specific_date),
            RecurrenceKind::Unavailable => Recurrence::Unavailable(self.specific_date),
        }
    }

    pub fn to_new_rule(&self) -> std::result::Result<NewAvailabilityRule, RuleError> {
        NewAvailabilityRule::new(
            self.recurrence(),
            self.start_time,
            self.end_time,
            self.is_available,
            notes_value(&self.notes),
        )
    }
}

/// One time template applied to a checkbox group of weekdays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkForm {
    #[serde(alias = "days_of_week")]
    pub days: BTreeSet<DayOfWeek>,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(with = "wire_time")]
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub notes: String,
}

impl Default for BulkForm {
    fn default() -> Self {
        Self {
            days: BTreeSet::new(),
            start_time: default_start(),
            end_time: default_end(),
            is_available: true,
            notes: String::new(),
        }
    }
}

impl BulkForm {
    pub fn toggle_day(&mut self, day: DayOfWeek) {
        if !self.days.remove(&day) {
            self.days.insert(day);
        }
    }

    pub fn to_request(&self, practitioner: PractitionerId) -> Result<BulkAvailabilityRequest> {
        if self.days.is_empty() {
            return Err(AvailabilityError::EmptyWeekdaySelection);
        }
        let request = BulkAvailabilityRequest {
            practitioner,
            days_of_week: self.days.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            is_available: self.is_available,
            notes: notes_value(&self.notes),
        };
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManagerStatus {
    NotLoaded,
    NoProfile,
    Ready { practitioner_id: PractitionerId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "rule_id", rename_all = "snake_case")]
pub enum FormMode {
    Closed,
    Creating,
    Editing(RuleId),
}

/// Practitioner-facing screen for viewing and editing one's own rules.
///
/// Every successful write is followed by a full refetch so the displayed
/// list always matches the server.
pub struct AvailabilityManager {
    store: AvailabilityStore,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    status: ManagerStatus,
    profile: Option<PractitionerProfile>,
    form: RuleForm,
    form_mode: FormMode,
    bulk_form: BulkForm,
    bulk_open: bool,
}

impl AvailabilityManager {
    pub fn new(store: AvailabilityStore, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        Self {
            store,
            notifier,
            clock,
            status: ManagerStatus::NotLoaded,
            profile: None,
            form: RuleForm::blank(today),
            form_mode: FormMode::Closed,
            bulk_form: BulkForm::default(),
            bulk_open: false,
        }
    }

    pub fn store(&self) -> &AvailabilityStore {
        &self.store
    }

    pub fn status(&self) -> &ManagerStatus {
        &self.status
    }

    pub fn profile(&self) -> Option<&PractitionerProfile> {
        self.profile.as_ref()
    }

    pub fn practitioner_id(&self) -> Option<PractitionerId> {
        match self.status {
            ManagerStatus::Ready { practitioner_id } => Some(practitioner_id),
            _ => None,
        }
    }

    pub fn rules(&self) -> Vec<AvailabilityRule> {
        self.store.rules()
    }

    pub fn is_loading(&self) -> bool {
        self.store.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.store.error()
    }

    pub fn form(&self) -> &RuleForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut RuleForm {
        &mut self.form
    }

    pub fn form_mode(&self) -> FormMode {
        self.form_mode
    }

    pub fn bulk_form(&self) -> &BulkForm {
        &self.bulk_form
    }

    pub fn bulk_form_mut(&mut self) -> &mut BulkForm {
        &mut self.bulk_form
    }

    pub fn is_bulk_open(&self) -> bool {
        self.bulk_open
    }

    fn report(&self, err: &AvailabilityError) {
        self.notifier.notify(Notice::error(err.user_message()));
    }

    fn require_practitioner(&self) -> Result<PractitionerId> {
        self.practitioner_id().ok_or(AvailabilityError::NoPractitionerProfile)
    }

    /// Resolve the practitioner profile, then load the rule list. Without a
    /// profile nothing else is loaded.
    pub async fn mount(&mut self) -> Result<&ManagerStatus> {
        let profile = match self.store.fetch_my_profile().await {
            Ok(profile) => profile,
            Err(err) => {
                self.report(&err);
                return Err(err);
            }
        };

        match profile {
            None => {
                info!("Current user has no practitioner profile");
                self.status = ManagerStatus::NoProfile;
                self.profile = None;
            }
            Some(profile) => {
                debug!("Managing availability for practitioner {}", profile.id);
                self.status = ManagerStatus::Ready {
                    practitioner_id: profile.id,
                };
                self.profile = Some(profile);
                self.refresh().await?;
            }
        }

        Ok(&self.status)
    }

    pub async fn refresh(&self) -> Result<Vec<AvailabilityRule>> {
        self.store.fetch_my_availability(None).await.inspect_err(|err| {
            self.report(err);
        })
    }

    pub fn open_create(&mut self) {
        self.form = RuleForm::blank(self.clock.today());
        self.form_mode = FormMode::Creating;
    }

    pub fn edit(&mut self, id: RuleId) -> bool {
        let Some(rule) = self.store.rules().into_iter().find(|rule| rule.id == id) else {
            return false;
        };
        self.form = RuleForm::from_rule(&rule, self.clock.today());
        self.form_mode = FormMode::Editing(id);
        true
    }

    pub fn cancel_form(&mut self) {
        self.form = RuleForm::blank(self.clock.today());
        self.form_mode = FormMode::Closed;
    }

    /// Save the open form. On failure the form stays open with its input.
    pub async fn submit_form(&mut self) -> Result<AvailabilityRule> {
        self.require_practitioner()?;

        let rule = match self.form.to_new_rule() {
            Ok(rule) => rule,
            Err(err) => {
                let err = AvailabilityError::from(err);
                self.notifier.notify(Notice::blocking(Severity::Error, err.user_message()));
                return Err(err);
            }
        };

        let saved = match self.form_mode {
            FormMode::Editing(id) => self.store.update_slot(id, &AvailabilityUpdate::from(rule)).await,
            FormMode::Creating | FormMode::Closed => self.store.create_slot(&rule).await,
        };

        match saved {
            Ok(saved) => {
                let verb = if matches!(self.form_mode, FormMode::Editing(_)) { "updated" } else { "added" };
                self.notifier.notify(Notice::success(format!("Availability {}", verb)));
                self.cancel_form();
                let _ = self.refresh().await;
                Ok(saved)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    pub fn set_bulk_form(&mut self, form: BulkForm) {
        self.bulk_form = form;
        self.bulk_open = true;
    }

    pub fn open_bulk(&mut self) {
        self.bulk_form = BulkForm::default();
        self.bulk_open = true;
    }

    pub fn cancel_bulk(&mut self) {
        self.bulk_form = BulkForm::default();
        self.bulk_open = false;
    }

    /// Create the same time range on every checked weekday. Rejected before
    /// any remote call when no day is checked.
    pub async fn submit_bulk(&mut self) -> Result<Vec<AvailabilityRule>> {
        let practitioner_id = self.require_practitioner()?;

        let request = match self.bulk_form.to_request(practitioner_id) {
            Ok(request) => request,
            Err(err) => {
                self.notifier.notify(Notice::blocking(Severity::Warning, err.user_message()));
                return Err(err);
            }
        };

        match self.store.bulk_create_slots(&request).await {
            Ok(created) => {
                self.notifier
                    .notify(Notice::success(format!("Added availability for {} days", created.len())));
                self.cancel_bulk();
                let _ = self.refresh().await;
                Ok(created)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Delete after explicit confirmation. `Ok(false)` when the user declined.
    pub async fn delete(&mut self, id: RuleId) -> Result<bool> {
        self.require_practitioner()?;

        let prompt = match self.store.rules().iter().find(|rule| rule.id == id) {
            Some(rule) => format!("Delete availability {}?", rule.summary()),
            None => "Delete this availability?".to_string(),
        };
        if !self.notifier.confirm(&prompt).await {
            debug!("Deletion of {} declined", id);
            return Ok(false);
        }

        match self.store.delete_slot(id).await {
            Ok(()) => {
                self.notifier.notify(Notice::success("Availability deleted"));
                if self.form_mode == FormMode::Editing(id) {
                    self.cancel_form();
                }
                let _ = self.refresh().await;
                Ok(true)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }
}
