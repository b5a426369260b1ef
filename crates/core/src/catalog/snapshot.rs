//! Point-in-time view of the catalog rows a request references.

use std::collections::HashMap;

use armory_shared::types::{ItemTypeId, SiteId};

use super::types::{ItemType, Site};
use crate::ledger::error::ValidationError;

/// Sites and item types loaded for validating one request.
///
/// Rows absent from the snapshot are treated as unknown.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    sites: HashMap<SiteId, Site>,
    item_types: HashMap<ItemTypeId, ItemType>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from loaded rows.
    #[must_use]
    pub fn new(
        sites: impl IntoIterator<Item = Site>,
        item_types: impl IntoIterator<Item = ItemType>,
    ) -> Self {
        Self {
            sites: sites.into_iter().map(|s| (s.id, s)).collect(),
            item_types: item_types.into_iter().map(|i| (i.id, i)).collect(),
        }
    }

    /// Returns the site if it exists and is not soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSite` or `SiteDeleted`.
    pub fn require_site(&self, id: SiteId) -> Result<&Site, ValidationError> {
        let site = self.sites.get(&id).ok_or(ValidationError::UnknownSite(id))?;
        if site.is_deleted {
            return Err(ValidationError::SiteDeleted(id));
        }
        Ok(site)
    }

    /// Returns the item type if it exists and is not soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns `UnknownItemType` or `ItemTypeDeleted`.
    pub fn require_item_type(&self, id: ItemTypeId) -> Result<&ItemType, ValidationError> {
        let item = self
            .item_types
            .get(&id)
            .ok_or(ValidationError::UnknownItemType(id))?;
        if item.is_deleted {
            return Err(ValidationError::ItemTypeDeleted(id));
        }
        Ok(item)
    }
}
