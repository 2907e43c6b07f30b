//! User directory types.

use crate::{Timestamp, UserId, ValidationError};
use serde::{Deserialize, Serialize};

/// Display data kept for a user identified by the access gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "id")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub last_seen_at: Timestamp,
}

impl UserProfile {
    pub fn new(user_id: UserId, name: &str, email: &str, now: Timestamp) -> Result<Self, ValidationError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "email".to_string(),
            });
        }
        Ok(Self {
            user_id,
            name: name.trim().to_string(),
            email,
            last_seen_at: now,
        })
    }

    pub fn brief(&self) -> UserBrief {
        UserBrief {
            id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Compact user reference embedded in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserBrief {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl UserBrief {
    /// Placeholder for a user id with no directory entry.
    pub fn unknown(id: UserId) -> Self {
        Self {
            id,
            name: String::new(),
            email: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;
    use chrono::Utc;

    #[test]
    fn test_profile_normalizes_email() {
        let profile = UserProfile::new(UserId::now_v7(), " Ada ", " Ada@Example.COM ", Utc::now()).unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.brief().email, "ada@example.com");
    }

    #[test]
    fn test_profile_requires_email() {
        assert!(UserProfile::new(UserId::now_v7(), "Ada", "  ", Utc::now()).is_err());
    }
}
