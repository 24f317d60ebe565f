use serde::{Deserialize, Serialize};

use crate::users::repo_types::User;

/// Public user view: everything a client may see, never the password hash.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            is_active: u.is_active,
            is_verified: u.is_verified,
        }
    }
}

/// Short user view embedded in login responses and dependent listings.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

/// Request body for profile updates. Absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Request body for linking a dependent to the calling caregiver.
#[derive(Debug, Deserialize)]
pub struct AddDependentRequest {
    pub dependent_email: String,
}

#[derive(Debug, Serialize)]
pub struct AddDependentResponse {
    pub message: String,
    pub dependent_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn sample_user() -> User {
        User {
            id: 7,
            email: "test@example.com".into(),
            password_hash: "$argon2id$fake".into(),
            first_name: Some("Ada".into()),
            last_name: None,
            is_active: true,
            is_verified: false,
            caregiver_id: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn user_view_never_contains_password_hash() {
        let view = UserView::from(sample_user());
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn public_user_serializes_profile_fields() {
        let view = PublicUser::from(sample_user());
        let json = serde_json::to_string(&view).unwrap();
        assert!(json.contains("\"id\":7"));
        assert!(json.contains("\"first_name\":\"Ada\""));
        assert!(json.contains("\"last_name\":null"));
    }
}
