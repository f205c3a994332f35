//! GeoIP data structures.
//!
//! This module defines the records decoded from the MaxMind databases and the
//! [`GeoLocation`] response assembled for each query.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{CITY_PRODUCT, ISP_PRODUCT, MMDB_EXTENSION};

/// A MaxMind database product kept up to date by the geo updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    City,
    Isp,
}

impl Product {
    pub const ALL: [Product; 2] = [Product::City, Product::Isp];

    /// MaxMind edition id.
    pub fn edition(&self) -> &'static str {
        match self {
            Product::City => CITY_PRODUCT,
            Product::Isp => ISP_PRODUCT,
        }
    }

    /// Versioned database file name, `<edition>-<checksum>.mmdb`.
    pub fn file_name(&self, checksum: &str) -> String {
        format!("{}-{}{}", self.edition(), checksum, MMDB_EXTENSION)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.edition())
    }
}

/// Geographic position of an address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// ISP record as stored in the ISP database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(
        default,
        rename = "autonomous_system_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub asn: Option<u32>,
    #[serde(
        default,
        rename = "autonomous_system_organization",
        skip_serializing_if = "Option::is_none"
    )]
    pub asn_organization: Option<String>,
}

/// Locale-keyed names of a place (`"en" -> "Germany"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Names {
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

/// Country names plus ISO code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Country {
    #[serde(default)]
    pub names: BTreeMap<String, String>,
    #[serde(default)]
    pub iso_code: Option<String>,
}

/// The subset of a city database record used to build a [`GeoLocation`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CityRecord {
    #[serde(default)]
    pub location: Position,
    #[serde(default)]
    pub city: Names,
    #[serde(default)]
    pub subdivisions: Vec<Names>,
    #[serde(default)]
    pub country: Country,
}

/// Response to a single geo query.
///
/// The flattened `country`, `city` and `location` fields carry the English
/// values; `location_i18n` holds the composed location for every locale the
/// database has a country name for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<Isp>,
    pub position: Position,
    pub country: String,
    pub country_iso: String,
    pub city: String,
    pub location: String,
    pub location_i18n: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tor_node: Option<String>,
}

impl GeoLocation {
    /// True when the address is a known Tor exit.
    pub fn is_tor_exit(&self) -> bool {
        self.tor_node.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_file_names() {
        assert_eq!(Product::City.file_name("abc"), "GeoIP2-City-abc.mmdb");
        assert_eq!(Product::Isp.file_name("def"), "GeoIP2-ISP-def.mmdb");
        assert_eq!(Product::ALL.len(), 2);
    }

    #[test]
    fn test_geo_location_serializes_without_empty_options() {
        let location = GeoLocation {
            country: "Germany".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&location).unwrap();
        assert!(json.get("isp").is_none());
        assert!(json.get("tor_node").is_none());
        assert_eq!(json["country"], "Germany");
        assert!(!location.is_tor_exit());
    }
}
