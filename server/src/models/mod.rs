pub mod event;
pub mod registration;

pub use event::{CreateEventRequest, Event, EventChanges, EventStatus, EventSummary, NewEvent};
pub use registration::{
    AttendanceUpdate, AttendeeSummary, EventBrief, NewRegistration, Registration,
    RegistrationListing, RegistrationRequest, RegistrationStatus, TicketView,
};
