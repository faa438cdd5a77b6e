//! Deterministic stand-in dataset for running without a configured store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use tracing::debug;

use super::{RemoteStore, StoreError};
use crate::models::{
    Authorization, BillingClaim, ClaimStatus, NewStudent, ServiceInfo, Student, StudentRef,
    StudentUpdate, Teacher,
};
use crate::utils::{remove_record, sort_records, upsert_record};

/// A completed therapy session that should have a billing draft.
#[derive(Debug, Clone)]
struct CompletedSession {
    id: &'static str,
    student_id: &'static str,
    days_ago: i64,
    cpt_code: &'static str,
    units: i32,
    service_type: &'static str,
}

const SESSIONS: &[CompletedSession] = &[
    CompletedSession {
        id: "session-1",
        student_id: "student-1",
        days_ago: 1,
        cpt_code: "97153",
        units: 2,
        service_type: "aba_direct",
    },
    CompletedSession {
        id: "session-2",
        student_id: "student-2",
        days_ago: 3,
        cpt_code: "97155",
        units: 1,
        service_type: "aba_supervision",
    },
];

/// Rate per unit by CPT code
fn unit_rate(cpt_code: &str) -> f64 {
    match cpt_code {
        "97153" => 56.25,
        "97155" => 75.00,
        _ => 45.00,
    }
}

struct FallbackData {
    students: Vec<Student>,
    claims: Vec<BillingClaim>,
    next_id: u32,
}

/// In-memory store seeded with a small fixed dataset.
///
/// Reads return copies of the seed data, mutations apply to the in-memory copy,
/// and draft generation upserts one draft per completed session.
pub struct FallbackStore {
    today: NaiveDate,
    data: Mutex<FallbackData>,
}

impl Default for FallbackStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackStore {
    pub fn new() -> Self {
        Self::with_today(Utc::now().date_naive())
    }

    /// Seed relative to a fixed date so output is reproducible.
    pub fn with_today(today: NaiveDate) -> Self {
        let mut students = vec![
            seed_student("student-2", "Sarah Williams", "SW002", 10, "5"),
            seed_student("student-1", "Alex Johnson", "AJ001", 8, "3"),
        ];
        sort_records(&mut students);

        Self {
            today,
            data: Mutex::new(FallbackData {
                students,
                claims: Vec::new(),
                next_id: 3,
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, FallbackData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn date_offset(&self, days: i64) -> String {
        (self.today + Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    fn seed_teachers(&self) -> Vec<Teacher> {
        vec![Teacher {
            id: "teacher-1".to_string(),
            name: "Rachel Smith".to_string(),
            email: "rachel.smith@example.org".to_string(),
            school: "Lincoln Elementary".to_string(),
            created_at: None,
            updated_at: None,
        }]
    }

    fn seed_authorizations(&self) -> Vec<Authorization> {
        vec![
            Authorization {
                id: "auth-1".to_string(),
                student_id: "student-1".to_string(),
                student: Some(StudentRef {
                    id: "student-1".to_string(),
                    name: "Alex Johnson".to_string(),
                    student_id: "AJ001".to_string(),
                }),
                authorization_number: "AUTH-001".to_string(),
                payer_name: "BlueCross ABA".to_string(),
                payer_contact: Some("claims@bluecross.com".to_string()),
                service_type: Some("aba_direct".to_string()),
                total_units: 120,
                notes: Some("Initial ABA therapy authorization".to_string()),
                status: "active".to_string(),
                effective_on: self.date_offset(0),
                expires_on: self.date_offset(25),
                service: Some(ServiceInfo {
                    service_key: "aba_direct".to_string(),
                    label: "ABA Direct Therapy".to_string(),
                    default_cpt_code: Some("97153".to_string()),
                }),
            },
            Authorization {
                id: "auth-2".to_string(),
                student_id: "student-2".to_string(),
                student: Some(StudentRef {
                    id: "student-2".to_string(),
                    name: "Sarah Williams".to_string(),
                    student_id: "SW002".to_string(),
                }),
                authorization_number: "AUTH-002".to_string(),
                payer_name: "Medicaid".to_string(),
                payer_contact: Some("medicaid@state.gov".to_string()),
                service_type: Some("aba_supervision".to_string()),
                total_units: 80,
                notes: Some("Supervision units".to_string()),
                status: "active".to_string(),
                effective_on: self.date_offset(0),
                expires_on: self.date_offset(55),
                service: Some(ServiceInfo {
                    service_key: "aba_supervision".to_string(),
                    label: "ABA Supervision".to_string(),
                    default_cpt_code: Some("97155".to_string()),
                }),
            },
        ]
    }
}

fn seed_student(id: &str, name: &str, number: &str, age: i32, grade: &str) -> Student {
    Student {
        id: id.to_string(),
        name: name.to_string(),
        student_id: number.to_string(),
        age,
        grade: grade.to_string(),
        school: "Lincoln Elementary".to_string(),
        disability: "Autism".to_string(),
        teacher_id: Some("teacher-1".to_string()),
        profile_picture_url: None,
        created_at: None,
        updated_at: None,
    }
}

#[async_trait]
impl RemoteStore for FallbackStore {
    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        Ok(self.data().students.clone())
    }

    async fn list_teachers(&self) -> Result<Vec<Teacher>, StoreError> {
        Ok(self.seed_teachers())
    }

    async fn list_authorizations(&self) -> Result<Vec<Authorization>, StoreError> {
        Ok(self.seed_authorizations())
    }

    async fn list_claims(&self) -> Result<Vec<BillingClaim>, StoreError> {
        let mut claims = self.data().claims.clone();
        claims.sort_by(|a, b| b.session_date.cmp(&a.session_date));
        Ok(claims)
    }

    async fn create_student(&self, student: &NewStudent) -> Result<Student, StoreError> {
        let mut data = self.data();
        let id = format!("student-{}", data.next_id);
        data.next_id += 1;

        let created = Student {
            id,
            name: student.name.clone(),
            student_id: student.student_id.clone(),
            age: student.age,
            grade: student.grade.clone(),
            school: student.school.clone(),
            disability: student.disability.clone(),
            teacher_id: student.teacher_id.clone(),
            profile_picture_url: student.profile_picture_url.clone(),
            created_at: Some(Utc::now().to_rfc3339()),
            updated_at: None,
        };
        upsert_record(&mut data.students, created.clone());
        Ok(created)
    }

    async fn update_student(&self, id: &str, update: &StudentUpdate) -> Result<Student, StoreError> {
        let mut data = self.data();
        let mut student = data
            .students
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("student {}", id)))?;
        update.apply_to(&mut student);
        student.updated_at = Some(Utc::now().to_rfc3339());
        upsert_record(&mut data.students, student.clone());
        Ok(student)
    }

    async fn delete_student(&self, id: &str) -> Result<(), StoreError> {
        if remove_record(&mut self.data().students, id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("student {}", id)))
        }
    }

    async fn generate_billing_drafts(&self) -> Result<(), StoreError> {
        let mut data = self.data();
        let mut created = 0;

        for session in SESSIONS {
            let exists = data
                .claims
                .iter()
                .any(|c| c.session_id.as_deref() == Some(session.id));
            if exists {
                continue;
            }
            let Some(student) = data.students.iter().find(|s| s.id == session.student_id) else {
                continue;
            };

            let claim = BillingClaim {
                id: format!("claim-{}", session.id),
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                session_id: Some(session.id.to_string()),
                session_date: self.date_offset(-session.days_ago),
                cpt_code: session.cpt_code.to_string(),
                units: session.units,
                status: ClaimStatus::Draft,
                amount: unit_rate(session.cpt_code) * f64::from(session.units),
                service_type: Some(session.service_type.to_string()),
            };
            data.claims.push(claim);
            created += 1;
        }

        debug!(created, "Fallback drafts generated");
        Ok(())
    }
}
