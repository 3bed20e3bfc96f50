//! Validation token issuance.

use rand::Rng;
use validator::{Validate, ValidationError};

use crate::error::Result;

/// Prefix of tokens issued through the regional affiliate's verified flow.
pub const REGIONAL_MARKER: &str = "POA";
/// Prefix of tokens issued through the simplified data-confirmation flow.
pub const GENERIC_MARKER: &str = "UNI";
/// Insurer names containing this (case-insensitively) take the verified flow.
pub const REGIONAL_AFFILIATE: &str = "porto alegre";

/// The code a patient reads off the clinic reception or kiosk.
#[derive(Debug, Validate)]
struct ClinicCode {
    #[validate(
        length(min = 4, max = 6, message = "clinic code must have 4 to 6 characters"),
        custom = "alphanumeric"
    )]
    code: String,
}

fn alphanumeric(code: &str) -> Result<(), ValidationError> {
    if code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("alphanumeric");
        err.message = Some("clinic code must be letters and digits only".into());
        Err(err)
    }
}

pub fn is_regional_affiliate(insurance_name: &str) -> bool {
    insurance_name.to_lowercase().contains(REGIONAL_AFFILIATE)
}

/// `POA-<CODE>` for a valid clinic code.
pub fn regional_token(code: &str) -> Result<String> {
    let clinic_code = ClinicCode {
        code: code.trim().to_uppercase(),
    };
    clinic_code.validate()?;
    Ok(format!("{}-{}", REGIONAL_MARKER, clinic_code.code))
}

/// `UNI-<nnnn>` with a number in `1000..=9999`.
pub fn generic_token<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}-{}", GENERIC_MARKER, rng.gen_range(1000..=9999))
}
