use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::Identifiable;

/// A learner on the instructor's books. Only profile fields change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(display_name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            phone: None,
            email: None,
            created_at,
        }
    }
}

impl Identifiable for Student {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Editable subset of a [`Student`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct StudentProfile {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}
