use std::sync::Arc;

use drivedesk_domain::{Student, StudentProfile};
use tracing::info;
use uuid::Uuid;

use crate::{store::BackofficeStore, time::Clock, CoreError, CoreResult, RecordKind};

/// Registration and profile maintenance for students.
#[derive(Clone)]
pub struct StudentService {
    store: Arc<dyn BackofficeStore>,
    clock: Arc<dyn Clock>,
}

impl StudentService {
    pub fn new(store: Arc<dyn BackofficeStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn register(
        &self,
        display_name: &str,
        phone: Option<String>,
        email: Option<String>,
    ) -> CoreResult<Student> {
        let mut student = Student::new(required_name(display_name)?, self.clock.now());
        student.phone = optional(phone);
        student.email = optional(email);
        self.store.insert_student(student.clone())?;
        info!(student_id = %student.id, name = %student.display_name, "student registered");
        Ok(student)
    }

    /// Applies the fields set in `profile`; `Some("")` clears an optional field.
    pub fn update_profile(&self, student_id: Uuid, profile: StudentProfile) -> CoreResult<Student> {
        let mut student = self.get(student_id)?;
        if let Some(name) = profile.display_name {
            student.display_name = required_name(&name)?;
        }
        if let Some(phone) = profile.phone {
            student.phone = optional(Some(phone));
        }
        if let Some(email) = profile.email {
            student.email = optional(Some(email));
        }
        self.store.update_student(student.clone())?;
        info!(%student_id, "student profile updated");
        Ok(student)
    }

    pub fn get(&self, student_id: Uuid) -> CoreResult<Student> {
        self.store
            .student(student_id)?
            .ok_or_else(|| CoreError::not_found(RecordKind::Student, student_id))
    }

    /// All students ordered by name.
    pub fn list(&self) -> CoreResult<Vec<Student>> {
        let mut students = self.store.students()?;
        students.sort_by_cached_key(|student| student.display_name.to_lowercase());
        Ok(students)
    }

    /// Case-insensitive exact name lookup.
    pub fn find_by_name(&self, name: &str) -> CoreResult<Option<Student>> {
        let needle = name.trim().to_lowercase();
        Ok(self
            .store
            .students()?
            .into_iter()
            .find(|student| student.display_name.to_lowercase() == needle))
    }
}

fn required_name(name: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("student name must not be blank".into()));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
