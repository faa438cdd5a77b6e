use serde::{Deserialize, Serialize};

use super::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Draft,
    Pending,
    Flagged,
    Ready,
    Submitted,
    Approved,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ClaimStatus::Draft => "Draft",
            ClaimStatus::Pending => "Pending",
            ClaimStatus::Flagged => "Flagged",
            ClaimStatus::Ready => "Ready",
            ClaimStatus::Submitted => "Submitted",
            ClaimStatus::Approved => "Approved",
            ClaimStatus::Unknown => "Unknown",
        };
        write!(f, "{}", label)
    }
}

/// A billing claim. Drafts are upserted from completed sessions keyed by
/// session, so regenerating them never duplicates a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingClaim {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub session_id: Option<String>,
    pub session_date: String,
    pub cpt_code: String,
    pub units: i32,
    pub status: ClaimStatus,
    pub amount: f64,
    pub service_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRef {
    pub id: String,
    pub name: String,
    pub student_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub service_key: String,
    pub label: String,
    pub default_cpt_code: Option<String>,
}

/// Payer authorization of service units for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: String,
    pub student_id: String,
    pub student: Option<StudentRef>,
    pub authorization_number: String,
    pub payer_name: String,
    pub payer_contact: Option<String>,
    pub service_type: Option<String>,
    pub total_units: i32,
    pub notes: Option<String>,
    pub status: String,
    pub effective_on: String,
    pub expires_on: String,
    pub service: Option<ServiceInfo>,
}

impl Authorization {
    pub fn student_name(&self) -> &str {
        self.student
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("Unknown Student")
    }
}

impl Record for Authorization {
    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> &str {
        &self.authorization_number
    }
}
