//! Check-in wizard
//!
//! Drives the pre-check-in of one appointment. Patients of the regional
//! affiliate go through a biometric capture and then type the clinic code;
//! everyone else confirms their registration data in a single step. Either way
//! the wizard ends by writing a validation token onto the appointment.
//!
//! ```text
//! Idle ──start_biometric──▶ BiometricPending ──capture ok──▶ TokenEntry ──code──▶ Completed
//! Idle ──confirm_data─────────────────────────────────────────────────────────▶ Completed
//! ```
//!
//! Steps only move forward. A wizard opened on an already completed
//! appointment starts (and stays) in `Completed` with the stored token. An
//! appointment whose check-in is `NOT_STARTED` rejects both start triggers.

pub mod biometric;
pub mod token;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::{info, warn};

use crate::db::Storage;
use crate::error::{PortalError, Result};
use crate::models::{Account, Appointment, AppointmentUpdate, CheckIn, CheckInStatus};
use crate::store::RecordStore;

pub use biometric::{BiometricVerifier, SimulatedFaceCapture};
pub use token::{generic_token, is_regional_affiliate, regional_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Biometric capture followed by the clinic code.
    Verified,
    /// Single data-confirmation step.
    Simplified,
}

impl Branch {
    pub fn for_insurer(insurance_name: &str) -> Self {
        if is_regional_affiliate(insurance_name) {
            Branch::Verified
        } else {
            Branch::Simplified
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Idle,
    BiometricPending,
    TokenEntry,
    Completed,
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WizardState::Idle => "idle",
            WizardState::BiometricPending => "waiting for biometric capture",
            WizardState::TokenEntry => "waiting for the clinic code",
            WizardState::Completed => "check-in completed",
        };
        f.write_str(label)
    }
}

/// Patient fields shown for confirmation in the simplified flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySummary {
    pub name: String,
    pub card_number: Option<String>,
    pub valid_until: Option<String>,
    pub mother_name: Option<String>,
}

impl From<&Account> for IdentitySummary {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            card_number: account.details.card_number.clone(),
            valid_until: account.details.valid_until.clone(),
            mother_name: account.details.mother_name.clone(),
        }
    }
}

pub struct CheckInWizard<R = StdRng> {
    appointment_id: String,
    identity: IdentitySummary,
    branch: Branch,
    state: WizardState,
    open: bool,
    biometric_verified: bool,
    token: Option<String>,
    rng: R,
}

impl CheckInWizard<StdRng> {
    pub fn new(appointment: &Appointment, patient: &Account) -> Self {
        Self::with_rng(appointment, patient, StdRng::from_entropy())
    }
}

impl<R: Rng> CheckInWizard<R> {
    /// Open the wizard for `appointment`, routing on the patient's insurer.
    pub fn with_rng(appointment: &Appointment, patient: &Account, rng: R) -> Self {
        let token = appointment.validation_token().map(str::to_string);
        let state = if token.is_some() {
            WizardState::Completed
        } else {
            WizardState::Idle
        };

        Self {
            appointment_id: appointment.id.clone(),
            identity: IdentitySummary::from(patient),
            branch: Branch::for_insurer(patient.insurance_name()),
            state,
            open: appointment.check_in_status() == CheckInStatus::Available,
            biometric_verified: false,
            token,
            rng,
        }
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    /// Whether the appointment accepts a check-in right now.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn identity(&self) -> &IdentitySummary {
        &self.identity
    }

    pub fn biometric_verified(&self) -> bool {
        self.biometric_verified
    }

    /// The issued token, once the wizard is completed.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn invalid(&self, action: &'static str) -> PortalError {
        let state = if self.state == WizardState::Idle && !self.open {
            "check-in not open yet".to_string()
        } else {
            self.state.to_string()
        };
        PortalError::InvalidTransition { state, action }
    }

    /// Run the biometric capture of the verified flow.
    ///
    /// Dropping the returned future leaves the wizard in `BiometricPending`;
    /// calling this again resumes the capture.
    pub async fn start_biometric<V>(&mut self, verifier: &V) -> Result<()>
    where
        V: BiometricVerifier + ?Sized,
    {
        let resumable = match self.state {
            WizardState::Idle => self.open,
            WizardState::BiometricPending => true,
            _ => false,
        };
        if self.branch != Branch::Verified || !resumable {
            return Err(self.invalid("start the biometric capture"));
        }

        self.state = WizardState::BiometricPending;
        verifier.capture(&self.identity).await?;

        self.biometric_verified = true;
        self.state = WizardState::TokenEntry;
        info!("Biometric capture verified for appointment {}", self.appointment_id);
        Ok(())
    }

    /// Finish the verified flow with the code handed out by the clinic.
    pub fn submit_clinic_code<S: Storage>(
        &mut self,
        code: &str,
        store: &RecordStore<S>,
    ) -> Result<String> {
        if self.state != WizardState::TokenEntry {
            return Err(self.invalid("submit a clinic code"));
        }
        let token = regional_token(code)?;
        self.complete(store, token)
    }

    /// Finish the simplified flow once the patient confirms the identity summary.
    pub fn confirm_data<S: Storage>(&mut self, store: &RecordStore<S>) -> Result<String> {
        if self.branch != Branch::Simplified || self.state != WizardState::Idle || !self.open {
            return Err(self.invalid("confirm registration data"));
        }
        let token = generic_token(&mut self.rng);
        self.complete(store, token)
    }

    fn complete<S: Storage>(&mut self, store: &RecordStore<S>, token: String) -> Result<String> {
        let appointments = store.update_appointment(
            &self.appointment_id,
            AppointmentUpdate::check_in(CheckIn::completed(token.clone())),
        )?;
        if !appointments.iter().any(|a| a.id == self.appointment_id) {
            warn!("Check-in token issued for unknown appointment {}", self.appointment_id);
            return Err(PortalError::AppointmentNotFound(self.appointment_id.clone()));
        }

        self.state = WizardState::Completed;
        self.token = Some(token.clone());
        info!("Check-in completed for appointment {}", self.appointment_id);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStorage;
    use crate::models::NewAccount;
    use async_trait::async_trait;
    use std::time::Duration;

    fn store() -> RecordStore<MemoryStorage> {
        RecordStore::new(MemoryStorage::new())
    }

    fn patient(insurer: &str) -> Account {
        NewAccount::patient("João Silva Oliveira", "joao@example.com", "0032998877665544", insurer)
            .into_account("p1".into())
    }

    fn seeded(store: &RecordStore<MemoryStorage>) -> Appointment {
        store.list_appointments().unwrap().remove(0)
    }

    fn wizard(appointment: &Appointment, insurer: &str) -> CheckInWizard<StdRng> {
        CheckInWizard::with_rng(appointment, &patient(insurer), StdRng::seed_from_u64(42))
    }

    struct FailingCapture;

    #[async_trait]
    impl BiometricVerifier for FailingCapture {
        async fn capture(&self, _identity: &IdentitySummary) -> Result<()> {
            Err(PortalError::InvalidInput("camera unavailable".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn verified_flow_waits_for_capture_then_takes_code() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Unimed Porto Alegre");
        assert_eq!(wizard.branch(), Branch::Verified);

        let started = tokio::time::Instant::now();
        wizard
            .start_biometric(&SimulatedFaceCapture::new(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(wizard.biometric_verified());
        assert_eq!(wizard.state(), WizardState::TokenEntry);

        let token = wizard.submit_clinic_code("8877", &store).unwrap();
        assert_eq!(token, "POA-8877");
        assert_eq!(wizard.state(), WizardState::Completed);
        assert_eq!(seeded(&store).validation_token(), Some("POA-8877"));
    }

    #[tokio::test]
    async fn short_code_keeps_wizard_in_token_entry() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Unimed Porto Alegre");
        wizard
            .start_biometric(&SimulatedFaceCapture::new(Duration::ZERO))
            .await
            .unwrap();

        assert!(wizard.submit_clinic_code("887", &store).is_err());
        assert_eq!(wizard.state(), WizardState::TokenEntry);
        assert_eq!(seeded(&store).check_in_status(), CheckInStatus::Available);
    }

    #[test]
    fn code_cannot_skip_the_capture() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Unimed Porto Alegre");
        let err = wizard.submit_clinic_code("8877", &store).unwrap_err();
        assert!(matches!(err, PortalError::InvalidTransition { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_capture_can_be_resumed() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Unimed Porto Alegre");
        let capture = SimulatedFaceCapture::new(Duration::from_secs(2));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(500), wizard.start_biometric(&capture)).await;
        assert!(cancelled.is_err());
        assert_eq!(wizard.state(), WizardState::BiometricPending);
        assert!(!wizard.biometric_verified());

        wizard.start_biometric(&capture).await.unwrap();
        assert_eq!(wizard.state(), WizardState::TokenEntry);
    }

    #[tokio::test]
    async fn failed_capture_does_not_advance() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Unimed Porto Alegre");
        assert!(wizard.start_biometric(&FailingCapture).await.is_err());
        assert_eq!(wizard.state(), WizardState::BiometricPending);
    }

    #[test]
    fn simplified_flow_issues_generic_token() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Hospital Unimed - Bloco B");
        assert_eq!(wizard.branch(), Branch::Simplified);
        assert_eq!(wizard.identity().card_number.as_deref(), Some("0032998877665544"));

        let token = wizard.confirm_data(&store).unwrap();
        let digits = token.strip_prefix("UNI-").unwrap();
        assert_eq!(digits.len(), 4);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(seeded(&store).validation_token(), Some(token.as_str()));

        let err = wizard.confirm_data(&store).unwrap_err();
        assert!(matches!(err, PortalError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn simplified_flow_has_no_biometric_step() {
        let store = store();
        let mut wizard = wizard(&seeded(&store), "Unimed Nordeste");
        let err = wizard
            .start_biometric(&SimulatedFaceCapture::new(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidTransition { .. }));
        assert_eq!(wizard.state(), WizardState::Idle);
    }

    #[test]
    fn completed_appointment_opens_read_only() {
        let store = store();
        let appointments = store
            .update_appointment(
                "apt_demo_1",
                AppointmentUpdate::check_in(CheckIn::completed("POA-1234")),
            )
            .unwrap();

        let mut wizard = wizard(&appointments[0], "Unimed Nordeste");
        assert_eq!(wizard.state(), WizardState::Completed);
        assert_eq!(wizard.token(), Some("POA-1234"));
        assert!(wizard.confirm_data(&store).is_err());
        assert_eq!(seeded(&store).validation_token(), Some("POA-1234"));
    }

    #[test]
    fn unknown_appointment_is_reported() {
        let store = store();
        let mut appointment = seeded(&store);
        appointment.id = "ghost".into();

        let mut wizard = wizard(&appointment, "Unimed Nordeste");
        let err = wizard.confirm_data(&store).unwrap_err();
        assert!(matches!(err, PortalError::AppointmentNotFound(id) if id == "ghost"));
        assert_eq!(wizard.state(), WizardState::Idle);
    }

    fn not_started(store: &RecordStore<MemoryStorage>) -> Appointment {
        store
            .update_appointment("apt_demo_1", AppointmentUpdate::check_in(CheckIn::NotStarted))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn not_started_appointment_rejects_confirmation() {
        let store = store();
        let mut wizard = wizard(&not_started(&store), "Unimed Nordeste");
        assert!(!wizard.is_open());

        let err = wizard.confirm_data(&store).unwrap_err();
        assert!(
            matches!(err, PortalError::InvalidTransition { ref state, .. } if state == "check-in not open yet")
        );
        assert_eq!(wizard.state(), WizardState::Idle);
        assert_eq!(seeded(&store).check_in_status(), CheckInStatus::NotStarted);
    }

    #[tokio::test]
    async fn not_started_appointment_rejects_capture() {
        let store = store();
        let mut wizard = wizard(&not_started(&store), "Unimed Porto Alegre");

        let err = wizard
            .start_biometric(&SimulatedFaceCapture::new(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::InvalidTransition { .. }));
        assert_eq!(wizard.state(), WizardState::Idle);
        assert!(!wizard.biometric_verified());
        assert_eq!(seeded(&store).check_in_status(), CheckInStatus::NotStarted);
    }
}
