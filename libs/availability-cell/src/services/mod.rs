pub mod calendar;
pub mod client;
pub mod clock;
pub mod manager;
pub mod notify;
pub mod store;

pub use calendar::BookingCalendar;
pub use client::AvailabilityClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use manager::AvailabilityManager;
pub use notify::{Notice, Notifier, RecordingNotifier, Severity, TracingNotifier};
pub use store::{AvailabilityStore, FetchedSlots};
