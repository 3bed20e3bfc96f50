//! Entities owned by the record store.

pub mod account;
pub mod appointment;
pub mod request;

pub use account::{Account, NewAccount, PatientDetails, Role};
pub use appointment::{Appointment, AppointmentUpdate, CheckIn, CheckInStatus};
pub use request::{HealthRequest, NewRequest, RequestDecision, RequestStatus};
