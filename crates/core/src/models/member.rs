//! Member and dining preference models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Id reserved for the room owner
pub const OWNER_ID: &str = "owner";

/// Dietary sentinel that disables dietary filtering
pub const NO_RESTRICTION: &str = "No Restriction";

/// Whether a member created the room or joined it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Host,
    Guest,
}

/// What a member wants to eat, read verbatim by the matcher when they spin
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningPreferences {
    pub location: String,
    pub price: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

impl DiningPreferences {
    pub fn new(location: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            price: price.into(),
            categories: Vec::new(),
            dietary_restrictions: Vec::new(),
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dietary<I, S>(mut self, restrictions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dietary_restrictions = restrictions.into_iter().map(Into::into).collect();
        self
    }

    /// Reject create/join input that lacks a location, price, or cuisine
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(Error::Validation("location is required".into()));
        }
        if self.price.trim().is_empty() {
            return Err(Error::Validation("price is required".into()));
        }
        if !self.categories.iter().any(|c| !c.trim().is_empty()) {
            return Err(Error::Validation("at least one cuisine is required".into()));
        }
        Ok(())
    }

    /// True when dietary filtering applies to this query
    pub fn has_dietary_filter(&self) -> bool {
        !self.dietary_restrictions.is_empty()
            && !self
                .dietary_restrictions
                .iter()
                .any(|d| d.eq_ignore_ascii_case(NO_RESTRICTION))
    }
}

/// A participant in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub member_type: MemberType,
    pub preferences: DiningPreferences,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn owner(name: String, preferences: DiningPreferences) -> Self {
        Self {
            id: OWNER_ID.to_string(),
            name,
            member_type: MemberType::Host,
            preferences,
            joined_at: Utc::now(),
        }
    }

    pub fn guest(id: String, name: String, preferences: DiningPreferences) -> Self {
        Self {
            id,
            name,
            member_type: MemberType::Guest,
            preferences,
            joined_at: Utc::now(),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.id == OWNER_ID
    }
}
