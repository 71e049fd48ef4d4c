//! Restaurant dataset storage and import

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, Row};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::parse::parse_string_list;
use crate::error::Result;
use crate::matcher::RestaurantFilter;
use crate::models::Restaurant;

pub struct RestaurantStore<'a> {
    conn: &'a Connection,
}

impl<'a> RestaurantStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace rows by id, in one transaction
    #[instrument(skip(self, restaurants), fields(count = restaurants.len()))]
    pub fn import(&self, restaurants: &[Restaurant]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO restaurants
                 (id, name, neighborhood, address, price, categories, dietary, rating, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in restaurants {
                stmt.execute(params![
                    r.id,
                    r.name,
                    r.neighborhood,
                    r.address,
                    r.price,
                    serde_json::to_string(&r.categories)?,
                    serde_json::to_string(&r.dietary_restrictions)?,
                    r.rating,
                    r.url,
                ])?;
            }
        }
        tx.commit()?;

        info!(count = restaurants.len(), "Restaurants imported");
        Ok(restaurants.len())
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM restaurants", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Rows matching the filter, ordered by id.
    ///
    /// Price narrows the query in SQL; the substring fields are checked
    /// against the decoded rows so both backends share one definition.
    #[instrument(skip(self))]
    pub fn find(&self, filter: &RestaurantFilter) -> Result<Vec<Restaurant>> {
        const COLUMNS: &str =
            "SELECT id, name, neighborhood, address, price, categories, dietary, rating, url
             FROM restaurants";

        let rows = match &filter.price {
            Some(price) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{} WHERE price = ?1 ORDER BY id", COLUMNS))?;
                let rows = stmt
                    .query_map(params![price], restaurant_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.conn.prepare(&format!("{} ORDER BY id", COLUMNS))?;
                let rows = stmt
                    .query_map([], restaurant_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        let matched: Vec<Restaurant> = rows.into_iter().filter(|r| filter.matches(r)).collect();
        debug!(matched = matched.len(), "Restaurant query");
        Ok(matched)
    }
}

fn restaurant_from_row(row: &Row<'_>) -> rusqlite::Result<Restaurant> {
    Ok(Restaurant {
        id: row.get(0)?,
        name: row.get(1)?,
        neighborhood: row.get(2)?,
        address: row.get(3)?,
        price: row.get(4)?,
        categories: parse_string_list(5, row.get(5)?)?,
        dietary_restrictions: parse_string_list(6, row.get(6)?)?,
        rating: row.get(7)?,
        url: row.get(8)?,
    })
}

/// Accepted dataset file shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    List(Vec<Restaurant>),
    Wrapped { restaurants: Vec<Restaurant> },
}

/// Read a restaurant dataset from a JSON file.
///
/// The file is either an array of restaurants or an object with a
/// `restaurants` array.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_restaurants_json<P: AsRef<Path>>(path: P) -> Result<Vec<Restaurant>> {
    let text = fs::read_to_string(path)?;
    let restaurants = match serde_json::from_str(&text)? {
        DatasetFile::List(list) => list,
        DatasetFile::Wrapped { restaurants } => restaurants,
    };
    debug!(count = restaurants.len(), "Dataset loaded");
    Ok(restaurants)
}

#[cfg(test)]
mod tests {
    use super::super::Database;
    use super::*;
    use crate::storage::RestaurantCatalog;
    use std::io::Write;

    fn dataset() -> Vec<Restaurant> {
        vec![
            Restaurant::new("a", "Lupa")
                .located("SoHo", "170 Thompson St")
                .priced("$$")
                .serving(["Italian"]),
            Restaurant::new("b", "Superiority Burger")
                .located("East Village", "119 Avenue A")
                .priced("$")
                .serving(["Burgers", "Vegetarian"])
                .accommodating(["Vegan", "Vegetarian"]),
        ]
    }

    #[test]
    fn test_import_and_filter() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.import_restaurants(&dataset()).unwrap(), 2);
        // Re-import replaces rows by id
        db.import_restaurants(&dataset()).unwrap();
        assert_eq!(db.restaurants().count().unwrap(), 2);

        let all = db.find_restaurants(&RestaurantFilter::any()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].dietary_restrictions, vec!["Vegan", "Vegetarian"]);

        let filter = RestaurantFilter {
            location: Some("avenue".into()),
            price: Some("$".into()),
            dietary: vec!["vegan".into()],
            ..RestaurantFilter::any()
        };
        let found = db.find_restaurants(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Superiority Burger");

        let filter = RestaurantFilter {
            price: Some("$$$$".into()),
            ..RestaurantFilter::any()
        };
        assert!(db.find_restaurants(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_load_json_shapes() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(
            list,
            r#"[{{"id":"1","name":"Lupa","neighborhood":"SoHo","price":"$$","categories":["Italian"]}}]"#
        )
        .unwrap();
        let loaded = load_restaurants_json(list.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].categories, vec!["Italian"]);
        assert!(loaded[0].dietary_restrictions.is_empty());

        let mut wrapped = tempfile::NamedTempFile::new().unwrap();
        write!(wrapped, r#"{{"restaurants":[{{"id":"2","name":"Jajaja"}}]}}"#).unwrap();
        assert_eq!(load_restaurants_json(wrapped.path()).unwrap()[0].name, "Jajaja");

        let mut broken = tempfile::NamedTempFile::new().unwrap();
        write!(broken, "{{").unwrap();
        assert!(load_restaurants_json(broken.path()).is_err());
    }
}
