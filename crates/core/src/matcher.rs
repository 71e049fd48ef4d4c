//! Restaurant matcher - resolves one member's preferences to a restaurant
//!
//! Tiers are tried top to bottom; the first tier with any match wins and a
//! uniformly random row is picked from it. The table below is the only place
//! tier order lives.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{DiningPreferences, MatchType, Restaurant};
use crate::storage::RestaurantCatalog;

/// A query field a tier may filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Location,
    Price,
    Categories,
    Dietary,
}

use FilterField::{Categories, Dietary, Location, Price};

/// One step of the relaxation cascade
#[derive(Debug, Clone, Copy)]
pub struct MatchTier {
    pub match_type: MatchType,
    pub fields: &'static [FilterField],
    /// When set, a field the member left empty is dropped from the filter.
    /// Otherwise the tier is skipped, so a relaxed tier never stands in for
    /// a looser one further down.
    pub lenient: bool,
}

impl MatchTier {
    const fn new(match_type: MatchType, fields: &'static [FilterField]) -> Self {
        Self {
            match_type,
            fields,
            lenient: false,
        }
    }

    const fn lenient(match_type: MatchType, fields: &'static [FilterField]) -> Self {
        Self {
            match_type,
            fields,
            lenient: true,
        }
    }
}

/// Fixed-priority cascade. An empty field list matches the whole dataset.
pub const CASCADE: &[MatchTier] = &[
    MatchTier::lenient(MatchType::Exact, &[Location, Price, Categories, Dietary]),
    MatchTier::new(MatchType::LocationPriceDietary, &[Location, Price, Dietary]),
    MatchTier::new(MatchType::LocationPrice, &[Location, Price]),
    MatchTier::new(MatchType::LocationCuisineDietary, &[Location, Categories, Dietary]),
    MatchTier::new(MatchType::LocationCuisine, &[Location, Categories]),
    MatchTier::new(MatchType::LocationDietary, &[Location, Dietary]),
    MatchTier::new(MatchType::LocationOnly, &[Location]),
    MatchTier::new(MatchType::PriceCuisineDietary, &[Price, Categories, Dietary]),
    MatchTier::new(MatchType::PriceCuisine, &[Price, Categories]),
    MatchTier::new(MatchType::CuisineDietary, &[Categories, Dietary]),
    MatchTier::new(MatchType::CuisineOnly, &[Categories]),
    MatchTier::new(MatchType::DietaryOnly, &[Dietary]),
    MatchTier::new(MatchType::PriceOnly, &[Price]),
    MatchTier::new(MatchType::Random, &[]),
];

/// Field filters handed to a restaurant catalog.
///
/// `None`/empty means the field is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestaurantFilter {
    /// Case-insensitive substring of neighborhood or address
    pub location: Option<String>,
    /// Exact price tier
    pub price: Option<String>,
    /// Any entry is a case-insensitive substring of any category
    pub categories: Vec<String>,
    /// Any entry is a case-insensitive substring of any dietary tag
    pub dietary: Vec<String>,
}

impl RestaurantFilter {
    /// No constraints; matches every row
    pub fn any() -> Self {
        Self::default()
    }

    /// Build the filter for one tier of the cascade.
    ///
    /// Returns `None` when the tier cannot apply to these preferences. A
    /// dietary list holding only the "No Restriction" sentinel counts as
    /// empty for this purpose.
    pub fn for_tier(prefs: &DiningPreferences, tier: &MatchTier) -> Option<Self> {
        let mut filter = Self::any();

        for field in tier.fields {
            let present = match field {
                Location => {
                    filter.location = non_blank(&prefs.location);
                    filter.location.is_some()
                }
                Price => {
                    filter.price = non_blank(&prefs.price);
                    filter.price.is_some()
                }
                Categories => {
                    filter.categories = non_blank_list(&prefs.categories);
                    !filter.categories.is_empty()
                }
                Dietary => {
                    if prefs.has_dietary_filter() {
                        filter.dietary = non_blank_list(&prefs.dietary_restrictions);
                    }
                    !filter.dietary.is_empty()
                }
            };

            if !present && !tier.lenient {
                return None;
            }
        }

        Some(filter)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.location.is_none()
            && self.price.is_none()
            && self.categories.is_empty()
            && self.dietary.is_empty()
    }

    /// Field-match semantics shared by every catalog implementation
    pub fn matches(&self, restaurant: &Restaurant) -> bool {
        if let Some(location) = &self.location {
            let needle = location.to_lowercase();
            if !contains_ci(&restaurant.neighborhood, &needle)
                && !contains_ci(&restaurant.address, &needle)
            {
                return false;
            }
        }

        if let Some(price) = &self.price {
            if &restaurant.price != price {
                return false;
            }
        }

        if !self.categories.is_empty() && !any_substring(&self.categories, &restaurant.categories)
        {
            return false;
        }

        if !self.dietary.is_empty()
            && !any_substring(&self.dietary, &restaurant.dietary_restrictions)
        {
            return false;
        }

        true
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn non_blank_list(items: &[String]) -> Vec<String> {
    items.iter().filter_map(|s| non_blank(s)).collect()
}

fn contains_ci(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}

/// True when any query term is a case-insensitive substring of any value
fn any_substring(query: &[String], values: &[String]) -> bool {
    query.iter().any(|q| {
        let needle = q.to_lowercase();
        values.iter().any(|v| contains_ci(v, &needle))
    })
}

/// Outcome of one match; `restaurant` is `None` only for an empty dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub restaurant: Option<Restaurant>,
    pub match_type: MatchType,
}

/// Run the cascade against a catalog.
///
/// Never reports "no match": the final tier covers the whole dataset, and an
/// empty dataset yields `MatchType::None`.
pub fn match_restaurant<C, R>(
    catalog: &C,
    prefs: &DiningPreferences,
    rng: &mut R,
) -> Result<MatchResult>
where
    C: RestaurantCatalog + ?Sized,
    R: Rng + ?Sized,
{
    for tier in CASCADE {
        let Some(filter) = RestaurantFilter::for_tier(prefs, tier) else {
            continue;
        };
        let candidates = catalog.find_restaurants(&filter)?;

        if let Some(pick) = candidates.choose(rng) {
            debug!(
                match_type = %tier.match_type,
                candidates = candidates.len(),
                restaurant = %pick.name,
                "Matched restaurant"
            );
            return Ok(MatchResult {
                restaurant: Some(pick.clone()),
                match_type: tier.match_type,
            });
        }
    }

    debug!("Restaurant dataset is empty");
    Ok(MatchResult {
        restaurant: None,
        match_type: MatchType::None,
    })
}
