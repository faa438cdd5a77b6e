use serde::{Deserialize, Serialize};

use super::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    /// District-assigned student number.
    pub student_id: String,
    pub age: i32,
    pub grade: String,
    pub school: String,
    pub disability: String,
    pub teacher_id: Option<String>,
    pub profile_picture_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Student {
    pub fn display_grade(&self) -> String {
        match self.grade.trim() {
            "" => "Unknown".to_string(),
            g if g.eq_ignore_ascii_case("k") => "Kindergarten".to_string(),
            g if g.chars().all(|c| c.is_ascii_digit()) => format!("Grade {}", g),
            g => g.to_string(),
        }
    }
}

impl Record for Student {
    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> &str {
        &self.name
    }
}

/// Insert payload for a new student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub student_id: String,
    pub age: i32,
    pub grade: String,
    pub school: String,
    pub disability: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
}

/// Partial update; only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
}

impl StudentUpdate {
    /// Apply the update to a local copy, as the store would.
    pub fn apply_to(&self, student: &mut Student) {
        if let Some(ref name) = self.name {
            student.name = name.clone();
        }
        if let Some(age) = self.age {
            student.age = age;
        }
        if let Some(ref grade) = self.grade {
            student.grade = grade.clone();
        }
        if let Some(ref school) = self.school {
            student.school = school.clone();
        }
        if let Some(ref disability) = self.disability {
            student.disability = disability.clone();
        }
        if let Some(ref teacher_id) = self.teacher_id {
            student.teacher_id = Some(teacher_id.clone());
        }
        if let Some(ref url) = self.profile_picture_url {
            student.profile_picture_url = Some(url.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub email: String,
    pub school: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Record for Teacher {
    fn id(&self) -> &str {
        &self.id
    }

    fn sort_key(&self) -> &str {
        &self.name
    }
}
