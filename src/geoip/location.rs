//! Localized location string composition.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{CityRecord, GeoLocation};

/// Countries whose first-level subdivision is shown by default.
const DEFAULT_SUBDIVISION_COUNTRIES: [&str; 5] = ["US", "CA", "MX", "IN", "CN"];

/// Policy for turning a city record into `"<city>, <subdivision>, <country>"`.
///
/// Only the first subdivision of a record is ever used. For countries with
/// several subdivision levels this picks the broadest one (a state rather
/// than a county), which is the intended simplification rather than a loss
/// of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationFormat {
    /// ISO country codes for which the subdivision is included.
    pub subdivision_countries: BTreeSet<String>,
    /// Locale used for the flattened fields and as fallback for missing names.
    pub fallback_locale: String,
    /// Separator placed between components.
    pub separator: String,
}

impl Default for LocationFormat {
    fn default() -> Self {
        Self {
            subdivision_countries: DEFAULT_SUBDIVISION_COUNTRIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fallback_locale: "en".to_string(),
            separator: ", ".to_string(),
        }
    }
}

impl LocationFormat {
    pub fn includes_subdivision(&self, iso_code: &str) -> bool {
        self.subdivision_countries.contains(iso_code)
    }

    /// Builds the composed location for every locale with a country name.
    ///
    /// Returns an empty map when the country has no name in the fallback locale.
    pub fn compose(&self, record: &CityRecord) -> BTreeMap<String, String> {
        let names = &record.country.names;
        if !names.contains_key(&self.fallback_locale) {
            return BTreeMap::new();
        }

        let iso_code = record.country.iso_code.as_deref().unwrap_or_default();
        let subdivision = record
            .subdivisions
            .first()
            .filter(|_| self.includes_subdivision(iso_code));

        names
            .iter()
            .map(|(locale, country)| {
                let city = self.localized(&record.city.names, locale);
                let region = subdivision
                    .map(|s| self.localized(&s.names, locale))
                    .unwrap_or_default();
                let composed = [city, region, country.as_str()]
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(&self.separator);
                (locale.clone(), composed)
            })
            .collect()
    }

    /// Fills the location fields of `target` from `record`.
    pub fn apply(&self, record: &CityRecord, target: &mut GeoLocation) {
        let fallback = self.fallback_locale.as_str();
        target.position = record.location.clone();
        target.location_i18n = self.compose(record);
        target.country = record
            .country
            .names
            .get(fallback)
            .cloned()
            .unwrap_or_default();
        target.city = record.city.names.get(fallback).cloned().unwrap_or_default();
        target.location = target
            .location_i18n
            .get(fallback)
            .cloned()
            .unwrap_or_default();
        target.country_iso = record.country.iso_code.clone().unwrap_or_default();
    }

    fn localized<'a>(&self, names: &'a BTreeMap<String, String>, locale: &str) -> &'a str {
        names
            .get(locale)
            .or_else(|| names.get(&self.fallback_locale))
            .map(String::as_str)
            .unwrap_or_default()
    }
}
