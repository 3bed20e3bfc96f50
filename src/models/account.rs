use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Manager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => f.write_str("patient"),
            Role::Manager => f.write_str("manager"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "manager" => Ok(Role::Manager),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A registered identity, patient or manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub details: PatientDetails,
}

impl Account {
    /// Whether `identifier` is this account's email or card number.
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.email == identifier || self.details.card_number.as_deref() == Some(identifier)
    }

    /// Registration conflict: same email, or same card number when both carry one.
    pub(crate) fn conflicts_with(&self, other: &NewAccount) -> bool {
        if self.email == other.email {
            return true;
        }
        match (&self.details.card_number, &other.details.card_number) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }

    pub fn insurance_name(&self) -> &str {
        self.details.insurance_name.as_deref().unwrap_or_default()
    }
}

/// Patient-only demographic and coverage fields. Managers leave them empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_unit: Option<String>,
}

/// Registration payload; the store assigns the id.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub role: Role,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(email(message = "email is not valid"))]
    pub email: String,
    #[serde(flatten)]
    pub details: PatientDetails,
}

impl NewAccount {
    pub fn manager(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            role: Role::Manager,
            name: name.into(),
            email: email.into(),
            details: PatientDetails::default(),
        }
    }

    pub fn patient(
        name: impl Into<String>,
        email: impl Into<String>,
        card_number: impl Into<String>,
        insurance_name: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Patient,
            name: name.into(),
            email: email.into(),
            details: PatientDetails {
                card_number: Some(card_number.into()),
                insurance_name: Some(insurance_name.into()),
                ..PatientDetails::default()
            },
        }
    }

    pub(crate) fn into_account(self, id: String) -> Account {
        Account {
            id,
            role: self.role,
            name: self.name,
            email: self.email,
            details: self.details,
        }
    }
}
