//! User Entity

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use bson::serde_helpers::chrono_datetime_as_bson_datetime;

fn default_true() -> bool {
    true
}

/// User entity - an account that can authenticate
///
/// Every user belongs to exactly one group. Institution membership is
/// optional: system operators typically have none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    /// Email address (unique, login identifier)
    pub email: String,

    /// Given name
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// Argon2id hash in PHC format. Never serialized raw passwords.
    pub password_hash: String,

    /// The single group this user belongs to
    pub group_id: String,

    /// Institution membership (None for users outside any tenant)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,

    /// Inactive accounts cannot authenticate
    #[serde(default = "default_true")]
    pub active: bool,

    /// Last successful login (None until the first one)
    #[serde(
        skip_serializing_if = "Option::is_none",
        default,
        with = "bson::serde_helpers::chrono_datetime_as_bson_datetime_optional"
    )]
    pub last_login_at: Option<DateTime<Utc>>,

    /// Audit fields
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password_hash: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into().to_lowercase(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            password_hash: password_hash.into(),
            group_id: group_id.into(),
            institution_id: None,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display name assembled from the split name fields.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn with_institution(mut self, institution_id: impl Into<String>) -> Self {
        self.institution_id = Some(institution_id.into());
        self
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.updated_at = Utc::now();
    }

    /// Remove institution membership (used when a tenant is deleted)
    pub fn detach_institution(&mut self) {
        self.institution_id = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized_to_lowercase() {
        let user = User::new("Alice@Example.COM", "Alice", "Smith", "$argon2id$...", "group-1");
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_full_name_joins_and_trims() {
        let user = User::new("a@b.com", "Alice", "Smith", "hash", "g");
        assert_eq!(user.full_name(), "Alice Smith");

        let mononym = User::new("c@d.com", "Cher", "", "hash", "g");
        assert_eq!(mononym.full_name(), "Cher");
    }

    #[test]
    fn test_detach_institution() {
        let mut user = User::new("a@b.com", "A", "B", "hash", "g").with_institution("inst-1");
        assert_eq!(user.institution_id.as_deref(), Some("inst-1"));

        user.detach_institution();
        assert!(user.institution_id.is_none());
    }
}
