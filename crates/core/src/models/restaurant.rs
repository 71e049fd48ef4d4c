//! Restaurant model and match tier tags

use serde::{Deserialize, Serialize};

/// A row of the restaurant dataset. Spins carry a full copy of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Restaurant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            neighborhood: String::new(),
            address: String::new(),
            price: String::new(),
            categories: Vec::new(),
            dietary_restrictions: Vec::new(),
            rating: None,
            url: None,
        }
    }

    pub fn located(mut self, neighborhood: impl Into<String>, address: impl Into<String>) -> Self {
        self.neighborhood = neighborhood.into();
        self.address = address.into();
        self
    }

    pub fn priced(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn serving<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn accommodating<I, S>(mut self, restrictions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dietary_restrictions = restrictions.into_iter().map(Into::into).collect();
        self
    }
}

/// Which cascade tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    LocationPriceDietary,
    LocationPrice,
    LocationCuisineDietary,
    LocationCuisine,
    LocationDietary,
    LocationOnly,
    PriceCuisineDietary,
    PriceCuisine,
    CuisineDietary,
    CuisineOnly,
    DietaryOnly,
    PriceOnly,
    Random,
    None,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::LocationPriceDietary => "location_price_dietary",
            MatchType::LocationPrice => "location_price",
            MatchType::LocationCuisineDietary => "location_cuisine_dietary",
            MatchType::LocationCuisine => "location_cuisine",
            MatchType::LocationDietary => "location_dietary",
            MatchType::LocationOnly => "location_only",
            MatchType::PriceCuisineDietary => "price_cuisine_dietary",
            MatchType::PriceCuisine => "price_cuisine",
            MatchType::CuisineDietary => "cuisine_dietary",
            MatchType::CuisineOnly => "cuisine_only",
            MatchType::DietaryOnly => "dietary_only",
            MatchType::PriceOnly => "price_only",
            MatchType::Random => "random",
            MatchType::None => "none",
        }
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_type_wire_names() {
        let json = serde_json::to_string(&MatchType::LocationPriceDietary).unwrap();
        assert_eq!(json, "\"location_price_dietary\"");
        assert_eq!(MatchType::None.to_string(), "none");
        assert_eq!(MatchType::Exact.as_str(), "exact");
    }
}
