use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::{auth::repo::User, error::ApiError};

pub const DEFAULT_AVATAR: &str = "default.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

fn default_avatar() -> String {
    DEFAULT_AVATAR.to_string()
}

/// Profile payload, stored as a JSONB document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    pub full_name: String,
    #[serde(default)]
    pub age: Option<i32>,
    pub phone: String,
    #[serde(default)]
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub pregnancy_week: Option<i32>,
    #[serde(default = "default_avatar")]
    pub avatar: String,
}

impl PersonalDetails {
    /// Profile seeded from the account when none has been saved yet.
    pub fn default_for(user: &User) -> Self {
        Self {
            full_name: user.name.clone(),
            age: None,
            phone: user.phone.clone(),
            blood_type: None,
            pregnancy_week: None,
            avatar: default_avatar(),
        }
    }

    /// Validates a submitted document for creation; fullName and phone are
    /// mandatory and non-empty.
    pub fn from_submitted(raw: Value) -> Result<Self, ApiError> {
        let has = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .is_some_and(|s| !s.is_empty())
        };
        if !has("fullName") || !has("phone") {
            return Err(ApiError::bad_request("Missing required fields"));
        }
        serde_json::from_value(raw).map_err(|e| {
            tracing::warn!(error = %e, "personal info rejected");
            ApiError::bad_request("Invalid personal info data")
        })
    }
}

/// Overlays the submitted fields onto `current`. Keys absent from `patch` keep
/// their stored value; an explicit null clears optional fields.
pub fn merge_details(current: &PersonalDetails, patch: &Value) -> Result<PersonalDetails, ApiError> {
    let Value::Object(fields) = patch else {
        return Err(ApiError::bad_request("Missing personal info data"));
    };
    let mut merged = serde_json::to_value(current).map_err(anyhow::Error::from)?;
    if let Value::Object(target) = &mut merged {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).map_err(|e| {
        tracing::warn!(error = %e, "personal info update rejected");
        ApiError::bad_request("Invalid personal info data")
    })
}

/// New account name when the update carries a non-empty fullName.
pub fn renamed_to(patch: &Value) -> Option<&str> {
    patch
        .get("fullName")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub personal_info: Json<PersonalDetails>,
}
