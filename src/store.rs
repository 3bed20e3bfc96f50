//! Record store for accounts, appointments, requests and the active session.
//!
//! Every operation is a synchronous read-modify-write of one collection in the
//! underlying [`Storage`].

use chrono::Local;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::Storage;
use crate::error::{PortalError, Result};
use crate::models::{
    Account, Appointment, AppointmentUpdate, CheckIn, CheckInStatus, HealthRequest, NewAccount,
    NewRequest, RequestDecision, RequestStatus, Role,
};

// Collection keys
pub const ACCOUNTS_KEY: &str = "portal_accounts";
pub const REQUESTS_KEY: &str = "portal_requests";
pub const APPOINTMENTS_KEY: &str = "portal_appointments";
pub const SESSION_KEY: &str = "portal_session";

/// Appointment written on first access to an empty appointment collection.
pub fn default_appointments() -> Vec<Appointment> {
    vec![Appointment {
        id: "apt_demo_1".into(),
        patient_name: "João Silva Oliveira".into(),
        doctor_name: "Dra. Marina Santos".into(),
        specialty: "Traumatologia Joelho".into(),
        date: "25/05".into(),
        time: "14:30".into(),
        location: "Unidade Central".into(),
        check_in: CheckIn::Available,
    }]
}

/// Counters shown on the manager dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardStats {
    pub validated_check_ins: usize,
    pub appointments: usize,
    pub pending_requests: usize,
}

pub struct RecordStore<S> {
    storage: S,
}

impl<S: Storage> RecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.storage.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| PortalError::CorruptRecord {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.storage.set(key, &raw)
    }

    fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    // ===== Accounts & Session =====

    #[instrument(skip(self, new_account), fields(role = %new_account.role))]
    pub fn register(&self, new_account: NewAccount) -> Result<Account> {
        new_account.validate()?;

        let mut accounts: Vec<Account> = self.load_list(ACCOUNTS_KEY)?;
        if accounts.iter().any(|a| a.conflicts_with(&new_account)) {
            warn!("Registration rejected: duplicate email or card number");
            return Err(PortalError::DuplicateAccount);
        }

        let account = new_account.into_account(Uuid::new_v4().to_string());
        accounts.push(account.clone());
        self.save(ACCOUNTS_KEY, &accounts)?;

        info!("Account registered: {}", account.id);
        Ok(account)
    }

    /// Find an account by email or card number with the given role and make
    /// it the active session. No password is checked.
    #[instrument(skip(self, identifier), fields(role = %role))]
    pub fn login(&self, identifier: &str, role: Role) -> Result<Account> {
        let account = self
            .list_accounts()?
            .into_iter()
            .find(|a| a.role == role && a.matches_identifier(identifier))
            .ok_or(PortalError::InvalidCredentials)?;

        self.save(SESSION_KEY, &account.id)?;
        info!("Session started for {}", account.id);
        Ok(account)
    }

    pub fn logout(&self) -> Result<()> {
        self.storage.remove(SESSION_KEY)?;
        debug!("Session cleared");
        Ok(())
    }

    pub fn current_session(&self) -> Result<Option<Account>> {
        let Some(account_id) = self.load::<String>(SESSION_KEY)? else {
            return Ok(None);
        };
        let account = self
            .list_accounts()?
            .into_iter()
            .find(|a| a.id == account_id);
        if account.is_none() {
            warn!("Session points at unknown account {}", account_id);
        }
        Ok(account)
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.load_list(ACCOUNTS_KEY)
    }

    // ===== Requests =====

    #[instrument(skip(self, request), fields(patient = %request.patient_name))]
    pub fn save_request(&self, request: NewRequest) -> Result<HealthRequest> {
        let mut requests: Vec<HealthRequest> = self.load_list(REQUESTS_KEY)?;

        let saved = HealthRequest {
            id: Uuid::new_v4().to_string(),
            patient_name: request.patient_name,
            kind: request.kind,
            description: request.description,
            date: Local::now().format("%d/%m/%Y").to_string(),
            status: RequestStatus::Pending,
            attachment_url: request.attachment_url,
        };
        requests.push(saved.clone());
        self.save(REQUESTS_KEY, &requests)?;

        info!("Request {} submitted", saved.id);
        Ok(saved)
    }

    pub fn list_requests(&self) -> Result<Vec<HealthRequest>> {
        self.load_list(REQUESTS_KEY)
    }

    /// Overwrite the status of request `id`. Unknown ids are ignored.
    #[instrument(skip(self), fields(id = %id, status = %status))]
    pub fn update_request_status(&self, id: &str, status: RequestStatus) -> Result<()> {
        let mut requests: Vec<HealthRequest> = self.load_list(REQUESTS_KEY)?;
        let Some(request) = requests.iter_mut().find(|r| r.id == id) else {
            debug!("No request with id {}", id);
            return Ok(());
        };
        request.status = status;
        self.save(REQUESTS_KEY, &requests)?;
        info!("Request {} set to {}", id, status);
        Ok(())
    }

    /// Manager decision on a pending request. Returns `None` for an unknown id.
    #[instrument(skip(self), fields(id = %id))]
    pub fn review_request(
        &self,
        id: &str,
        decision: RequestDecision,
    ) -> Result<Option<HealthRequest>> {
        let mut requests: Vec<HealthRequest> = self.load_list(REQUESTS_KEY)?;
        let Some(request) = requests.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if request.status != RequestStatus::Pending {
            return Err(PortalError::InvalidTransition {
                state: format!("request is {}", request.status),
                action: "review a request",
            });
        }
        request.status = decision.into();
        let reviewed = request.clone();
        self.save(REQUESTS_KEY, &requests)?;

        info!("Request {} reviewed: {}", id, reviewed.status);
        Ok(Some(reviewed))
    }

    pub fn requests_for_patient(&self, patient_name: &str) -> Result<Vec<HealthRequest>> {
        Ok(self
            .list_requests()?
            .into_iter()
            .filter(|r| r.patient_name == patient_name)
            .collect())
    }

    pub fn pending_requests(&self) -> Result<Vec<HealthRequest>> {
        Ok(self
            .list_requests()?
            .into_iter()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect())
    }

    // ===== Appointments & Tokens =====

    /// All appointments. An empty store is seeded with
    /// [`default_appointments`] and the seed is persisted.
    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        if let Some(appointments) = self.load(APPOINTMENTS_KEY)? {
            return Ok(appointments);
        }
        let seeded = default_appointments();
        self.save(APPOINTMENTS_KEY, &seeded)?;
        info!("Seeded {} default appointment(s)", seeded.len());
        Ok(seeded)
    }

    /// Merge `update` into appointment `id` and return the whole collection.
    /// Unknown ids leave the collection as it was.
    #[instrument(skip(self, update), fields(id = %id))]
    pub fn update_appointment(
        &self,
        id: &str,
        update: AppointmentUpdate,
    ) -> Result<Vec<Appointment>> {
        let mut appointments = self.list_appointments()?;
        match appointments.iter_mut().find(|a| a.id == id) {
            Some(appointment) => {
                appointment.apply(update);
                info!(
                    "Appointment {} updated, check-in {}",
                    id,
                    appointment.check_in_status()
                );
            }
            None => debug!("No appointment with id {}", id),
        }
        self.save(APPOINTMENTS_KEY, &appointments)?;
        Ok(appointments)
    }

    pub fn validated_check_ins(&self) -> Result<Vec<Appointment>> {
        Ok(self
            .list_appointments()?
            .into_iter()
            .filter(|a| a.check_in_status() == CheckInStatus::Completed)
            .collect())
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats> {
        let appointments = self.list_appointments()?;
        let validated_check_ins = appointments
            .iter()
            .filter(|a| a.check_in_status() == CheckInStatus::Completed)
            .count();
        Ok(DashboardStats {
            validated_check_ins,
            appointments: appointments.len(),
            pending_requests: self.pending_requests()?.len(),
        })
    }
}
