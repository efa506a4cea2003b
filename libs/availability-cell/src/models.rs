use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

pub type RuleId = Uuid;
pub type PractitionerId = Uuid;

// ==============================================================================
// WIRE FORMATS
// ==============================================================================

/// Times travel as `HH:MM:SS`; `HH:MM` and fractional seconds are accepted on input.
pub mod wire_time {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub const WIRE_FORMAT: &str = "%H:%M:%S";

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(WIRE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time of day: {}", raw)))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{de::Error, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid time of day: {}", raw))),
                None => Ok(None),
            }
        }
    }
}

/// `HH:MM` rendering used for display.
pub fn display_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

// ==============================================================================
// RULE INVARIANTS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Day of week must be between 0 (Monday) and 6 (Sunday), got {0}")]
    DayOutOfRange(u8),

    #[error("A {0} rule requires a day of week")]
    MissingDayOfWeek(RecurrenceKind),

    #[error("A {0} rule requires a specific date")]
    MissingSpecificDate(RecurrenceKind),

    #[error("A {0} rule must not carry both a day of week and a specific date")]
    ConflictingAnchors(RecurrenceKind),

    #[error("Start time {start} must be before end time {end}")]
    TimeOrder { start: NaiveTime, end: NaiveTime },
}

fn check_time_order(start: NaiveTime, end: NaiveTime) -> Result<(), RuleError> {
    if start < end {
        Ok(())
    } else {
        Err(RuleError::TimeOrder { start, end })
    }
}

/// Day of week as the remote API numbers it: 0 = Monday through 6 = Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const MONDAY: DayOfWeek = DayOfWeek(0);
    pub const TUESDAY: DayOfWeek = DayOfWeek(1);
    pub const WEDNESDAY: DayOfWeek = DayOfWeek(2);
    pub const THURSDAY: DayOfWeek = DayOfWeek(3);
    pub const FRIDAY: DayOfWeek = DayOfWeek(4);
    pub const SATURDAY: DayOfWeek = DayOfWeek(5);
    pub const SUNDAY: DayOfWeek = DayOfWeek(6);

    pub fn new(index: u8) -> Result<Self, RuleError> {
        if index <= 6 {
            Ok(DayOfWeek(index))
        } else {
            Err(RuleError::DayOutOfRange(index))
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        DayOfWeek::from(date.weekday())
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "Monday",
            1 => "Tuesday",
            2 => "Wednesday",
            3 => "Thursday",
            4 => "Friday",
            5 => "Saturday",
            _ => "Sunday",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        DayOfWeek(weekday.num_days_from_monday() as u8)
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = RuleError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        DayOfWeek::new(index)
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Weekly,
    OneTime,
    Unavailable,
}

impl RecurrenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrenceKind::Weekly => "weekly",
            RecurrenceKind::OneTime => "one_time",
            RecurrenceKind::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a rule applies. Exactly one anchor exists per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Weekly(DayOfWeek),
    OneTime(NaiveDate),
    Unavailable(NaiveDate),
}

impl Recurrence {
    pub fn kind(&self) -> RecurrenceKind {
        match self {
            Recurrence::Weekly(_) => RecurrenceKind::Weekly,
            Recurrence::OneTime(_) => RecurrenceKind::OneTime,
            Recurrence::Unavailable(_) => RecurrenceKind::Unavailable,
        }
    }

    pub fn day_of_week(&self) -> Option<DayOfWeek> {
        match self {
            Recurrence::Weekly(day) => Some(*day),
            _ => None,
        }
    }

    pub fn specific_date(&self) -> Option<NaiveDate> {
        match self {
            Recurrence::OneTime(date) | Recurrence::Unavailable(date) => Some(*date),
            Recurrence::Weekly(_) => None,
        }
    }

    /// Rebuild from the wire's kind plus its two nullable anchor columns.
    pub fn from_parts(
        kind: RecurrenceKind,
        day_of_week: Option<u8>,
        specific_date: Option<NaiveDate>,
    ) -> Result<Self, RuleError> {
        match (kind, day_of_week, specific_date) {
            (RecurrenceKind::Weekly, Some(day), None) => Ok(Recurrence::Weekly(DayOfWeek::new(day)?)),
            (RecurrenceKind::Weekly, None, _) => Err(RuleError::MissingDayOfWeek(kind)),
            (RecurrenceKind::OneTime, None, Some(date)) => Ok(Recurrence::OneTime(date)),
            (RecurrenceKind::Unavailable, None, Some(date)) => Ok(Recurrence::Unavailable(date)),
            (_, _, None) => Err(RuleError::MissingSpecificDate(kind)),
            _ => Err(RuleError::ConflictingAnchors(kind)),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recurrence::Weekly(day) => write!(f, "every {}", day),
            Recurrence::OneTime(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Recurrence::Unavailable(date) => write!(f, "blocked {}", date.format("%Y-%m-%d")),
        }
    }
}

fn serialize_anchors<M: SerializeMap>(map: &mut M, recurrence: &Recurrence) -> Result<(), M::Error> {
    map.serialize_entry("recurrence_type", &recurrence.kind())?;
    map.serialize_entry("day_of_week", &recurrence.day_of_week())?;
    map.serialize_entry("specific_date", &recurrence.specific_date())?;
    Ok(())
}

// ==============================================================================
// AVAILABILITY RULE
// ==============================================================================

/// A practitioner's stated availability or blackout period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct AvailabilityRule {
    pub id: RuleId,
    pub practitioner: PractitionerId,
    pub recurrence: Recurrence,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
    pub notes: Option<String>,
}

impl AvailabilityRule {
    pub fn kind(&self) -> RecurrenceKind {
        self.recurrence.kind()
    }

    /// e.g. `Monday 09:00–12:00`.
    pub fn summary(&self) -> String {
        let anchor = match self.recurrence {
            Recurrence::Weekly(day) => day.name().to_string(),
            Recurrence::OneTime(date) | Recurrence::Unavailable(date) => date.format("%Y-%m-%d").to_string(),
        };
        let mut summary = format!(
            "{} {}–{}",
            anchor,
            display_time(self.start_time),
            display_time(self.end_time)
        );
        if !self.is_available || matches!(self.recurrence, Recurrence::Unavailable(_)) {
            summary.push_str(" (unavailable)");
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleRecord {
    id: RuleId,
    #[serde(alias = "practitioner_id")]
    practitioner: PractitionerId,
    recurrence_type: RecurrenceKind,
    #[serde(default)]
    day_of_week: Option<u8>,
    #[serde(default)]
    specific_date: Option<NaiveDate>,
    #[serde(with = "wire_time")]
    start_time: NaiveTime,
    #[serde(with = "wire_time")]
    end_time: NaiveTime,
    is_available: bool,
    #[serde(default)]
    notes: Option<String>,
}

impl TryFrom<RuleRecord> for AvailabilityRule {
    type Error = RuleError;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let recurrence = Recurrence::from_parts(record.recurrence_type, record.day_of_week, record.specific_date)?;
        check_time_order(record.start_time, record.end_time)?;
        Ok(AvailabilityRule {
            id: record.id,
            practitioner: record.practitioner,
            recurrence,
            start_time: record.start_time,
            end_time: record.end_time,
            is_available: record.is_available,
            notes: record.notes,
        })
    }
}

impl From<AvailabilityRule> for RuleRecord {
    fn from(rule: AvailabilityRule) -> Self {
        RuleRecord {
            id: rule.id,
            practitioner: rule.practitioner,
            recurrence_type: rule.recurrence.kind(),
            day_of_week: rule.recurrence.day_of_week().map(u8::from),
            specific_date: rule.recurrence.specific_date(),
            start_time: rule.start_time,
            end_time: rule.end_time,
            is_available: rule.is_available,
            notes: rule.notes,
        }
    }
}

// ==============================================================================
// REQUEST PAYLOADS
// ==============================================================================

/// Payload for creating one rule. Construction enforces the rule invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NewRuleRecord", into = "NewRuleRecord")]
pub struct NewAvailabilityRule {
    recurrence: Recurrence,
    start_time: NaiveTime,
    end_time: NaiveTime,
    is_available: bool,
    notes: Option<String>,
}

impl NewAvailabilityRule {
    pub fn new(
        recurrence: Recurrence,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_available: bool,
        notes: Option<String>,
    ) -> Result<Self, RuleError> {
        check_time_order(start_time, end_time)?;
        Ok(Self {
            recurrence,
            start_time,
            end_time,
            is_available,
            notes,
        })
    }

    pub fn recurrence(&self) -> Recurrence {
        self.recurrence
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NewRuleRecord {
    recurrence_type: RecurrenceKind,
    #[serde(default)]
    day_of_week: Option<u8>,
    #[serde(default)]
    specific_date: Option<NaiveDate>,
    #[serde(with = "wire_time")]
    start_time: NaiveTime,
    #[serde(with = "wire_time")]
    end_time: NaiveTime,
    #[serde(default = "default_true")]
    is_available: bool,
    #[serde(default)]
    notes: Option<String>,
}

fn default_true() -> bool {
    true
}

impl TryFrom<NewRuleRecord> for NewAvailabilityRule {
    type Error = RuleError;

    fn try_from(record: NewRuleRecord) -> Result<Self, Self::Error> {
        let recurrence = Recurrence::from_parts(record.recurrence_type, record.day_of_week, record.specific_date)?;
        NewAvailabilityRule::new(recurrence, record.start_time, record.end_time, record.is_available, record.notes)
    }
}

impl From<NewAvailabilityRule> for NewRuleRecord {
    fn from(rule: NewAvailabilityRule) -> Self {
        NewRuleRecord {
            recurrence_type: rule.recurrence.kind(),
            day_of_week: rule.recurrence.day_of_week().map(u8::from),
            specific_date: rule.recurrence.specific_date(),
            start_time: rule.start_time,
            end_time: rule.end_time,
            is_available: rule.is_available,
            notes: rule.notes,
        }
    }
}

/// Fields to change on an existing rule. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "UpdateRecord")]
pub struct AvailabilityUpdate {
    pub recurrence: Option<Recurrence>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub is_available: Option<bool>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

impl AvailabilityUpdate {
    pub fn is_empty(&self) -> bool {
        self == &AvailabilityUpdate::default()
    }

    /// Rejects a patch whose own start/end pair is out of order.
    pub fn validate(&self) -> Result<(), RuleError> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            check_time_order(start, end)?;
        }
        Ok(())
    }
}

impl From<NewAvailabilityRule> for AvailabilityUpdate {
    fn from(rule: NewAvailabilityRule) -> Self {
        AvailabilityUpdate {
            recurrence: Some(rule.recurrence),
            start_time: Some(rule.start_time),
            end_time: Some(rule.end_time),
            is_available: Some(rule.is_available),
            notes: Some(rule.notes),
        }
    }
}

// Present-but-null stays distinct from absent.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// Anchors are written as a unit so switching kind clears the other column.
impl Serialize for AvailabilityUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(recurrence) = &self.recurrence {
            serialize_anchors(&mut map, recurrence)?;
        }
        if let Some(start) = self.start_time {
            map.serialize_entry("start_time", &start.format(wire_time::WIRE_FORMAT).to_string())?;
        }
        if let Some(end) = self.end_time {
            map.serialize_entry("end_time", &end.format(wire_time::WIRE_FORMAT).to_string())?;
        }
        if let Some(is_available) = self.is_available {
            map.serialize_entry("is_available", &is_available)?;
        }
        if let Some(notes) = &self.notes {
            map.serialize_entry("notes", notes)?;
        }
        map.end()
    }
}

#[derive(Debug, Deserialize)]
struct UpdateRecord {
    #[serde(default)]
    recurrence_type: Option<RecurrenceKind>,
    #[serde(default)]
    day_of_week: Option<u8>,
    #[serde(default)]
    specific_date: Option<NaiveDate>,
    #[serde(default, with = "wire_time::option")]
    start_time: Option<NaiveTime>,
    #[serde(default, with = "wire_time::option")]
    end_time: Option<NaiveTime>,
    #[serde(default)]
    is_available: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    notes: Option<Option<String>>,
}

impl TryFrom<UpdateRecord> for AvailabilityUpdate {
    type Error = RuleError;

    fn try_from(record: UpdateRecord) -> Result<Self, Self::Error> {
        let recurrence = match record.recurrence_type {
            Some(kind) => Some(Recurrence::from_parts(kind, record.day_of_week, record.specific_date)?),
            None => None,
        };
        let update = AvailabilityUpdate {
            recurrence,
            start_time: record.start_time,
            end_time: record.end_time,
            is_available: record.is_available,
            notes: record.notes,
        };
        update.validate()?;
        Ok(update)
    }
}

/// One time template applied to several weekdays for one practitioner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAvailabilityRequest {
    pub practitioner: PractitionerId,
    pub days_of_week: BTreeSet<DayOfWeek>,
    #[serde(with = "wire_time")]
    pub start_time: NaiveTime,
    #[serde(with = "wire_time")]
    pub end_time: NaiveTime,
    pub is_available: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BulkAvailabilityRequest {
    pub fn validate(&self) -> Result<(), RuleError> {
        check_time_order(self.start_time, self.end_time)
    }

    /// The weekly rules this request stands for, one per selected day.
    pub fn expand(&self) -> Result<Vec<NewAvailabilityRule>, RuleError> {
        self.days_of_week
            .iter()
            .map(|day| {
                NewAvailabilityRule::new(
                    Recurrence::Weekly(*day),
                    self.start_time,
                    self.end_time,
                    self.is_available,
                    self.notes.clone(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCreateResponse {
    #[serde(default)]
    pub slots: Vec<AvailabilityRule>,
}

/// Optional filters for listing the caller's own rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AvailabilityFilters {
    pub recurrence_type: Option<RecurrenceKind>,
    pub day_of_week: Option<DayOfWeek>,
    pub is_available: Option<bool>,
}

impl AvailabilityFilters {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(kind) = self.recurrence_type {
            query.push(("recurrence_type", kind.as_str().to_string()));
        }
        if let Some(day) = self.day_of_week {
            query.push(("day_of_week", day.index().to_string()));
        }
        if let Some(is_available) = self.is_available {
            query.push(("is_available", is_available.to_string()));
        }
        query
    }
}

// ==============================================================================
// TIME SLOTS
// ==============================================================================

/// A bookable unit of time derived server-side. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "SlotRecord", into = "SlotRecord")]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimeSlot {
    pub fn label(&self) -> String {
        format!("{} - {}", display_time(self.start_time), display_time(self.end_time))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlotRecord {
    date: NaiveDate,
    #[serde(with = "wire_time")]
    start_time: NaiveTime,
    #[serde(with = "wire_time")]
    end_time: NaiveTime,
}

impl TryFrom<SlotRecord> for TimeSlot {
    type Error = RuleError;

    fn try_from(record: SlotRecord) -> Result<Self, Self::Error> {
        check_time_order(record.start_time, record.end_time)?;
        Ok(TimeSlot {
            date: record.date,
            start_time: record.start_time,
            end_time: record.end_time,
        })
    }
}

impl From<TimeSlot> for SlotRecord {
    fn from(slot: TimeSlot) -> Self {
        SlotRecord {
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
        }
    }
}

/// Result of asking whether one date/time can still be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCheck {
    #[serde(alias = "is_available")]
    pub available: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl SlotCheck {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}
