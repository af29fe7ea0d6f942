//! Public views of a user record returned by the API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use devconnect_shared::types::UserId;
use devconnect_store::User;

/// Profile fields shown in connection lists.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
    pub bio: String,
    pub skills: Vec<String>,
}

impl From<&User> for ConnectionProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            profile_picture: user.profile_picture.clone(),
            bio: user.bio.clone(),
            skills: user.skills.clone(),
        }
    }
}

/// Full public profile, used for suggestions and search results.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub profile_picture: String,
    pub github: String,
    pub linkedin: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            bio: user.bio.clone(),
            skills: user.skills.clone(),
            profile_picture: user.profile_picture.clone(),
            github: user.github.clone(),
            linkedin: user.linkedin.clone(),
            is_online: user.is_online,
            last_seen: user.last_seen,
        }
    }
}
