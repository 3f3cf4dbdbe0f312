use serde::{Deserialize, Serialize};
use tracing::warn;

use super::catalog::build_listing_view;
use super::directory::require_role;
use super::domain::{Listing, ListingId, ListingKind, ListingStatus, ListingView, Role, User, UserId};
use super::error::LifecycleError;
use super::notify::Notifier;
use super::service::EnrollmentService;
use super::store::LedgerStore;

/// Listing filters shared by the external index and the store-scan fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub kind: Option<ListingKind>,
    #[serde(default)]
    pub owner_id: Option<UserId>,
    #[serde(default)]
    pub location: Option<String>,
    /// Comma-separated skill names; every one must be present.
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub include_closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
}

/// Read-only full-text index over listings, maintained outside the lifecycle core.
pub trait ListingSearch: Send + Sync {
    fn search(&self, query: &ListingQuery) -> Result<Vec<ListingId>, SearchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),
}

impl<S, N> EnrollmentService<S, N>
where
    S: LedgerStore + 'static,
    N: Notifier + 'static,
{
    pub fn search_listings(&self, query: &ListingQuery) -> Result<Vec<ListingView>, LifecycleError> {
        let indexed = match &self.search_index {
            Some(index) => match index.search(query) {
                Ok(ids) => Some(ids),
                Err(err) => {
                    warn!(error = %err, "search index failed, falling back to store scan");
                    None
                }
            },
            None => None,
        };

        self.store.read(|view| {
            let listings: Vec<Listing> = match indexed {
                Some(ids) => ids.iter().filter_map(|id| view.listing(id)).collect(),
                None => view
                    .listings()
                    .into_iter()
                    .filter(|listing| listing_matches(listing, query))
                    .collect(),
            };
            Ok(listings
                .into_iter()
                .map(|listing| build_listing_view(view, listing))
                .collect())
        })
    }

    /// Student directory search for recruiters and institutions.
    pub fn search_candidates(
        &self,
        actor: &UserId,
        query: &CandidateQuery,
    ) -> Result<Vec<User>, LifecycleError> {
        self.store.read(|view| {
            require_role(
                view,
                actor,
                &[Role::Institute, Role::Company, Role::Admin],
                "search candidates",
            )?;
            Ok(view
                .users()
                .into_iter()
                .filter(|user| user.role == Role::Student && candidate_matches(user, query))
                .collect())
        })
    }
}

pub(crate) fn listing_matches(listing: &Listing, query: &ListingQuery) -> bool {
    if !query.include_closed && listing.status == ListingStatus::Closed {
        return false;
    }
    if query.kind.is_some_and(|kind| kind != listing.kind) {
        return false;
    }
    if query
        .owner_id
        .as_ref()
        .is_some_and(|owner| owner != &listing.owner_id)
    {
        return false;
    }
    if let Some(keyword) = normalized(&query.q) {
        if !contains_ci(&listing.title, &keyword) && !contains_ci(&listing.description, &keyword) {
            return false;
        }
    }
    if let Some(location) = normalized(&query.location) {
        if !listing
            .location
            .as_deref()
            .is_some_and(|value| contains_ci(value, &location))
        {
            return false;
        }
    }
    has_all_skills(&listing.skills, query.skills.as_deref())
}

fn candidate_matches(user: &User, query: &CandidateQuery) -> bool {
    let profile = &user.profile;
    if let Some(keyword) = normalized(&query.q) {
        let in_headline = profile
            .headline
            .as_deref()
            .is_some_and(|headline| contains_ci(headline, &keyword));
        if !contains_ci(&profile.name, &keyword) && !in_headline {
            return false;
        }
    }
    if let Some(location) = normalized(&query.location) {
        if !profile
            .location
            .as_deref()
            .is_some_and(|value| contains_ci(value, &location))
        {
            return false;
        }
    }
    has_all_skills(&profile.skills, query.skills.as_deref())
}

fn has_all_skills(available: &[String], requested: Option<&str>) -> bool {
    let Some(requested) = requested else {
        return true;
    };
    requested
        .split(',')
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .all(|skill| available.iter().any(|have| have.eq_ignore_ascii_case(skill)))
}

fn normalized(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}
