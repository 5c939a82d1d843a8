//! The signed-in user's own profile document.

use serde::{Deserialize, Serialize};
use tracing::info;

use spotter_shared::protocol::{ProfileFields, UserProfile};
use spotter_shared::UserId;
use spotter_store::WriteMode;

use crate::error::{ClientError, Result};
use crate::session::Session;

/// Profile form as entered by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDraft {
    pub name: String,
    pub gym_name: String,
    pub workout_type: String,
    pub timing: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl ProfileDraft {
    /// Trim every field and reject the draft if a required one is blank.
    pub fn validate(&self, email: Option<&str>) -> Result<ProfileFields> {
        let required = |value: &str, field: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(ClientError::IncompleteProfile(field))
            } else {
                Ok(value.to_string())
            }
        };

        Ok(ProfileFields {
            name: required(&self.name, "name")?,
            gym_name: required(&self.gym_name, "gym name")?,
            workout_type: required(&self.workout_type, "workout type")?,
            timing: required(&self.timing, "timing")?,
            email: email.map(str::to_string),
            photo_url: self
                .photo_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
        })
    }
}

impl Session {
    /// First-time profile setup: replaces any existing document.
    pub async fn setup_profile(&self, draft: &ProfileDraft) -> Result<UserProfile> {
        let fields = draft.validate(self.email())?;
        let profile = self
            .store()
            .set_user(self.me(), self.me(), &fields, WriteMode::Overwrite)
            .await
            .map_err(ClientError::from_write)?;
        info!(user = %self.me().short(), "profile created");
        Ok(profile)
    }

    /// Edit the profile, keeping its creation time.
    pub async fn update_profile(&self, draft: &ProfileDraft) -> Result<UserProfile> {
        let mut fields = draft.validate(self.email())?;
        if fields.email.is_none() {
            fields.email = self
                .my_profile()
                .await?
                .and_then(|current| current.fields.email);
        }
        let profile = self
            .store()
            .set_user(self.me(), self.me(), &fields, WriteMode::Merge)
            .await
            .map_err(ClientError::from_write)?;
        info!(user = %self.me().short(), "profile updated");
        Ok(profile)
    }

    pub async fn load_profile(&self, user: &UserId) -> Result<Option<UserProfile>> {
        Ok(self.store().get_user(self.me(), user).await?)
    }

    pub async fn my_profile(&self) -> Result<Option<UserProfile>> {
        self.load_profile(self.me()).await
    }
}
