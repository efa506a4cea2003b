use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::error::AvailabilityError;
use crate::models::{DayOfWeek, PractitionerId, SlotCheck, TimeSlot};
use crate::services::clock::Clock;
use crate::services::notify::{Notice, Notifier};
use crate::services::store::AvailabilityStore;

/// A calendar month, e.g. `2024-05`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarMonth {
    first: NaiveDate,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first| Self { first })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first
            .pred_opt()
            .unwrap_or(self.first)
    }

    pub fn next(&self) -> Self {
        Self {
            first: self.first.checked_add_months(Months::new(1)).unwrap_or(self.first),
        }
    }

    pub fn prev(&self) -> Self {
        Self {
            first: self.first.checked_sub_months(Months::new(1)).unwrap_or(self.first),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let last = self.last_day();
        self.first.iter_days().take_while(move |day| *day <= last)
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for CalendarMonth {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (year, month) = raw
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {}", raw))?;
        let year: i32 = year.parse().map_err(|_| format!("invalid year in {}", raw))?;
        let month: u32 = month.parse().map_err(|_| format!("invalid month in {}", raw))?;
        CalendarMonth::new(year, month).ok_or_else(|| format!("invalid month {}", raw))
    }
}

impl Serialize for CalendarMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CalendarState {
    ViewingMonth,
    DateSelected { date: NaiveDate },
    ConfirmingSlot { date: NaiveDate, slot: TimeSlot },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub slot_count: usize,
    pub is_today: bool,
    pub is_past: bool,
    pub selectable: bool,
}

/// Render-ready snapshot of the calendar. Weeks start on Monday; cells
/// outside the month are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarView {
    pub practitioner_id: PractitionerId,
    pub month: CalendarMonth,
    pub weeks: Vec<Vec<Option<DayCell>>>,
    pub state: CalendarState,
    pub selected_slots: Vec<TimeSlot>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Slots keyed by date, each day sorted by start time.
pub fn group_by_date(slots: &[TimeSlot]) -> BTreeMap<NaiveDate, Vec<TimeSlot>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<TimeSlot>> = BTreeMap::new();
    for slot in slots {
        grouped.entry(slot.date).or_default().push(slot.clone());
    }
    for day in grouped.values_mut() {
        day.sort();
    }
    grouped
}

/// A day can be picked when it is not before today and has at least one slot.
pub fn is_selectable(date: NaiveDate, today: NaiveDate, slots_on_date: usize) -> bool {
    date >= today && slots_on_date > 0
}

/// Client-facing month calendar over one practitioner's bookable slots.
///
/// The calendar never books anything itself; confirming a slot hands it to
/// the caller's callback.
pub struct BookingCalendar {
    store: Arc<AvailabilityStore>,
    practitioner_id: PractitionerId,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    month: CalendarMonth,
    slots_by_date: BTreeMap<NaiveDate, Vec<TimeSlot>>,
    state: CalendarState,
}

impl BookingCalendar {
    pub fn new(
        store: Arc<AvailabilityStore>,
        practitioner_id: PractitionerId,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let month = CalendarMonth::containing(clock.today());
        Self {
            store,
            practitioner_id,
            notifier,
            clock,
            month,
            slots_by_date: BTreeMap::new(),
            state: CalendarState::ViewingMonth,
        }
    }

    pub fn month(&self) -> CalendarMonth {
        self.month
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    pub fn slots_on(&self, date: NaiveDate) -> &[TimeSlot] {
        self.slots_by_date.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_selectable(&self, date: NaiveDate) -> bool {
        is_selectable(date, self.clock.today(), self.slots_on(date).len())
    }

    /// Query the current month's slots. A response superseded by a newer
    /// query leaves the calendar untouched.
    pub async fn load(&mut self) -> Result<(), AvailabilityError> {
        let (start, end) = (self.month.first_day(), self.month.last_day());

        match self.store.fetch_time_slots(self.practitioner_id, start, end).await {
            Ok(fetched) if fetched.stale => {
                debug!("Ignoring superseded slot response for {}", self.month);
                Ok(())
            }
            Ok(fetched) => {
                debug!("Loaded {} slots for {}", fetched.slots.len(), self.month);
                self.slots_by_date = group_by_date(&fetched.slots);
                Ok(())
            }
            Err(err) => {
                self.notifier.notify(Notice::error(err.user_message()));
                Err(err)
            }
        }
    }

    pub async fn go_to_month(&mut self, month: CalendarMonth) -> Result<(), AvailabilityError> {
        self.month = month;
        self.state = CalendarState::ViewingMonth;
        self.slots_by_date.clear();
        self.load().await
    }

    pub async fn next_month(&mut self) -> Result<(), AvailabilityError> {
        self.go_to_month(self.month.next()).await
    }

    pub async fn prev_month(&mut self) -> Result<(), AvailabilityError> {
        self.go_to_month(self.month.prev()).await
    }

    /// Returns `false` and leaves state alone for non-selectable days.
    pub fn select_date(&mut self, date: NaiveDate) -> bool {
        if !self.is_selectable(date) {
            return false;
        }
        self.state = CalendarState::DateSelected { date };
        true
    }

    /// Open the confirmation step for one of the selected day's slots.
    pub fn select_slot(&mut self, slot: &TimeSlot) -> bool {
        let date = match &self.state {
            CalendarState::DateSelected { date } | CalendarState::ConfirmingSlot { date, .. } => *date,
            CalendarState::ViewingMonth => return false,
        };
        if slot.date != date || !self.slots_on(date).contains(slot) {
            return false;
        }
        self.state = CalendarState::ConfirmingSlot {
            date,
            slot: slot.clone(),
        };
        true
    }

    pub fn pending_slot(&self) -> Option<&TimeSlot> {
        match &self.state {
            CalendarState::ConfirmingSlot { slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// Last-moment bookability check of the slot awaiting confirmation.
    pub async fn verify_pending(&self) -> Option<SlotCheck> {
        let slot = self.pending_slot()?;
        Some(
            self.store
                .check_slot_availability(self.practitioner_id, slot.date, slot.start_time)
                .await,
        )
    }

    /// Hand the pending slot to `on_confirm` and return to the month view.
    pub fn confirm<F>(&mut self, on_confirm: F) -> Option<TimeSlot>
    where
        F: FnOnce(&TimeSlot),
    {
        let slot = self.pending_slot()?.clone();
        self.state = CalendarState::ViewingMonth;
        on_confirm(&slot);
        Some(slot)
    }

    pub fn cancel(&mut self) {
        self.state = CalendarState::ViewingMonth;
    }

    pub fn view(&self) -> CalendarView {
        let today = self.clock.today();
        let first = self.month.first_day();
        let lead = usize::from(DayOfWeek::of(first).index());

        let mut cells: Vec<Option<DayCell>> = vec![None; lead];
        cells.extend(self.month.days().map(|date| {
            let slot_count = self.slots_on(date).len();
            Some(DayCell {
                date,
                slot_count,
                is_today: date == today,
                is_past: date < today,
                selectable: is_selectable(date, today, slot_count),
            })
        }));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }

        let selected_slots = match &self.state {
            CalendarState::DateSelected { date } | CalendarState::ConfirmingSlot { date, .. } => {
                self.slots_on(*date).to_vec()
            }
            CalendarState::ViewingMonth => Vec::new(),
        };

        CalendarView {
            practitioner_id: self.practitioner_id,
            month: self.month,
            weeks: cells.chunks(7).map(<[Option<DayCell>]>::to_vec).collect(),
            state: self.state.clone(),
            selected_slots,
            loading: self.store.is_loading(),
            error: self.store.error(),
        }
    }
}
