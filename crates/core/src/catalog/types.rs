//! Catalog record types.

use armory_shared::types::{ItemTypeId, SiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::error::ValidationError;
use crate::ledger::validation::require_text;

/// Unit label used when an item type is created without one.
pub const DEFAULT_UNIT: &str = "units";

/// A physical location holding stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Site ID.
    pub id: SiteId,
    /// Unique short code.
    pub code: String,
    /// Unique display name.
    pub name: String,
    /// Free-text location.
    pub location: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// When the site was registered.
    pub created_at: DateTime<Utc>,
}

/// A category of trackable equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemType {
    /// Item type ID.
    pub id: ItemTypeId,
    /// Unique name.
    pub name: String,
    /// Optional description; empty when absent.
    pub description: String,
    /// Unit of measure label.
    pub unit: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// When the item type was registered.
    pub created_at: DateTime<Utc>,
}

/// Input for registering a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSite {
    /// Short code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Location.
    pub location: String,
}

impl NewSite {
    /// Trims every field and rejects blanks.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for the first blank field.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            code: require_text("code", &self.code)?,
            name: require_text("name", &self.name)?,
            location: require_text("location", &self.location)?,
        })
    }
}

/// Input for registering an item type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItemType {
    /// Name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Unit of measure; defaults to [`DEFAULT_UNIT`].
    #[serde(default)]
    pub unit: Option<String>,
}

impl NewItemType {
    /// Trims fields and fills defaults.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` when the name is blank.
    pub fn normalized(&self) -> Result<Self, ValidationError> {
        let unit = match self.unit.as_deref().map(str::trim) {
            Some(unit) if !unit.is_empty() => unit.to_string(),
            _ => DEFAULT_UNIT.to_string(),
        };
        Ok(Self {
            name: require_text("name", &self.name)?,
            description: Some(
                self.description
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
            ),
            unit: Some(unit),
        })
    }
}
