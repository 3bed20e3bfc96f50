use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckInStatus {
    NotStarted,
    Available,
    Completed,
}

impl fmt::Display for CheckInStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckInStatus::NotStarted => "NOT_STARTED",
            CheckInStatus::Available => "AVAILABLE",
            CheckInStatus::Completed => "COMPLETED",
        };
        f.write_str(label)
    }
}

/// Check-in progress of an appointment.
///
/// A validation token exists only in the `Completed` variant, so a completed
/// appointment always carries one and no other status can.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "checkInStatus", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckIn {
    NotStarted,
    Available,
    #[serde(rename_all = "camelCase")]
    Completed { validation_token: String },
}

impl CheckIn {
    pub fn completed(token: impl Into<String>) -> Self {
        CheckIn::Completed {
            validation_token: token.into(),
        }
    }

    pub fn status(&self) -> CheckInStatus {
        match self {
            CheckIn::NotStarted => CheckInStatus::NotStarted,
            CheckIn::Available => CheckInStatus::Available,
            CheckIn::Completed { .. } => CheckInStatus::Completed,
        }
    }

    pub fn validation_token(&self) -> Option<&str> {
        match self {
            CheckIn::Completed { validation_token } => Some(validation_token),
            _ => None,
        }
    }
}

/// A scheduled visit. `patient_name` is a denormalized copy, not a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub specialty: String,
    pub date: String,
    pub time: String,
    pub location: String,
    #[serde(flatten)]
    pub check_in: CheckIn,
}

impl Appointment {
    pub fn check_in_status(&self) -> CheckInStatus {
        self.check_in.status()
    }

    pub fn validation_token(&self) -> Option<&str> {
        self.check_in.validation_token()
    }

    /// Merge the fields set in `update` into this record.
    pub fn apply(&mut self, update: AppointmentUpdate) {
        let AppointmentUpdate {
            patient_name,
            doctor_name,
            specialty,
            date,
            time,
            location,
            check_in,
        } = update;

        if let Some(v) = patient_name {
            self.patient_name = v;
        }
        if let Some(v) = doctor_name {
            self.doctor_name = v;
        }
        if let Some(v) = specialty {
            self.specialty = v;
        }
        if let Some(v) = date {
            self.date = v;
        }
        if let Some(v) = time {
            self.time = v;
        }
        if let Some(v) = location {
            self.location = v;
        }
        if let Some(v) = check_in {
            self.check_in = v;
        }
    }
}

/// Partial appointment fields for `RecordStore::update_appointment`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentUpdate {
    pub patient_name: Option<String>,
    pub doctor_name: Option<String>,
    pub specialty: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub check_in: Option<CheckIn>,
}

impl AppointmentUpdate {
    pub fn check_in(check_in: CheckIn) -> Self {
        Self {
            check_in: Some(check_in),
            ..Self::default()
        }
    }
}
