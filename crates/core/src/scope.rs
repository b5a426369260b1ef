//! Caller site visibility.
//!
//! Every read path narrows its results with [`SiteVisibility`] and every write path
//! authorizes through [`Caller`], so a restricted caller cannot see or touch stock
//! held at other sites.

use std::collections::BTreeSet;

use armory_shared::types::{SiteId, UserId};
use serde::{Deserialize, Serialize};

use crate::ledger::error::StockError;
use crate::ledger::types::{Movement, MovementDetail};

/// Which sites a caller may see and act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "site_id", rename_all = "snake_case")]
pub enum SiteVisibility {
    /// Unrestricted.
    All,
    /// Restricted to one assigned site.
    Site(SiteId),
}

impl SiteVisibility {
    /// Returns true if the site is visible.
    #[must_use]
    pub fn permits(&self, site_id: SiteId) -> bool {
        match self {
            Self::All => true,
            Self::Site(assigned) => *assigned == site_id,
        }
    }

    /// Returns true if the movement is visible.
    ///
    /// Transfers are visible from either side.
    #[must_use]
    pub fn permits_movement(&self, movement: &Movement) -> bool {
        movement.sites().into_iter().any(|site| self.permits(site))
    }

    /// Intersects the visible sites with an optional explicit site list.
    #[must_use]
    pub fn narrow(&self, explicit: Option<&[SiteId]>) -> SiteSelection {
        match (self, explicit) {
            (Self::All, None) => SiteSelection::Any,
            (Self::All, Some(ids)) => SiteSelection::Only(ids.iter().copied().collect()),
            (Self::Site(assigned), None) => SiteSelection::Only(BTreeSet::from([*assigned])),
            (Self::Site(assigned), Some(ids)) => SiteSelection::Only(
                ids.iter().copied().filter(|id| id == assigned).collect(),
            ),
        }
    }
}

/// A set of sites a query is limited to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSelection {
    /// No site restriction.
    Any,
    /// Only these sites; empty means nothing matches.
    Only(BTreeSet<SiteId>),
}

impl SiteSelection {
    /// Returns true if the site is selected.
    #[must_use]
    pub fn contains(&self, site_id: SiteId) -> bool {
        match self {
            Self::Any => true,
            Self::Only(ids) => ids.contains(&site_id),
        }
    }

    /// Returns true if no site can match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(ids) if ids.is_empty())
    }

    /// Restricts the selection to sites that are still active.
    #[must_use]
    pub fn resolve(&self, active: impl IntoIterator<Item = SiteId>) -> BTreeSet<SiteId> {
        active.into_iter().filter(|id| self.contains(*id)).collect()
    }
}

/// The acting user and their visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Acting user.
    pub user_id: UserId,
    /// Sites the user may see and act on.
    pub visibility: SiteVisibility,
}

impl Caller {
    /// Creates an unrestricted caller.
    #[must_use]
    pub const fn unrestricted(user_id: UserId) -> Self {
        Self {
            user_id,
            visibility: SiteVisibility::All,
        }
    }

    /// Creates a caller restricted to one site.
    #[must_use]
    pub const fn restricted(user_id: UserId, site_id: SiteId) -> Self {
        Self {
            user_id,
            visibility: SiteVisibility::Site(site_id),
        }
    }

    /// Authorizes a write whose primary site is `site_id`.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Forbidden` when the site is outside the caller's scope.
    pub fn authorize_site(&self, site_id: SiteId) -> Result<(), StockError> {
        if self.visibility.permits(site_id) {
            Ok(())
        } else {
            Err(StockError::Forbidden { site_id })
        }
    }

    /// Authorizes a transfer; a restricted caller must be on one side of it.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Forbidden` naming the source site when neither side
    /// is visible.
    pub fn authorize_transfer(
        &self,
        source: SiteId,
        destination: SiteId,
    ) -> Result<(), StockError> {
        if self.visibility.permits(source) || self.visibility.permits(destination) {
            Ok(())
        } else {
            Err(StockError::Forbidden { site_id: source })
        }
    }

    /// Authorizes a change to an existing movement.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Forbidden` when the movement is not visible.
    pub fn authorize_movement(&self, movement: &Movement) -> Result<(), StockError> {
        match &movement.detail {
            MovementDetail::Transfer(t) => self.authorize_transfer(t.source, t.destination),
            MovementDetail::Acquisition(a) => self.authorize_site(a.destination),
            MovementDetail::Issuance(i) => self.authorize_site(i.site),
            MovementDetail::Consumption(c) => self.authorize_site(c.site),
        }
    }
}
