//! Per-query lookup against one coherent set of stores.

use std::net::IpAddr;

use super::location::LocationFormat;
use super::store::GeoStore;
use super::types::GeoLocation;
use crate::error_handling::StoreError;
use crate::tor::TorIndex;

/// Resolves `ip` against the given stores.
///
/// An ISP miss only drops the `isp` field; a city miss fails the query. The
/// Tor index is consulted only when one is loaded.
pub fn resolve(
    ip: IpAddr,
    city: &dyn GeoStore,
    isp: &dyn GeoStore,
    tor: Option<&TorIndex>,
    format: &LocationFormat,
) -> Result<GeoLocation, StoreError> {
    let mut location = GeoLocation {
        isp: match isp.lookup_isp(ip) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("ISP error for {}: {}", ip, e);
                None
            }
        },
        ..Default::default()
    };

    let record = city.lookup_city(ip).inspect_err(|e| {
        log::warn!("Lookup error for {}: {}", ip, e);
    })?;
    format.apply(&record, &mut location);

    location.tor_node = tor.and_then(|index| index.lookup(ip)).map(str::to_string);
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::types::{CityRecord, Country, Isp};
    use crate::tor::{ExitAddress, TorNode};
    use chrono::{DateTime, Utc};

    struct FixedStore {
        city: Option<CityRecord>,
        isp: Option<Isp>,
    }

    impl GeoStore for FixedStore {
        fn lookup_city(&self, ip: IpAddr) -> Result<CityRecord, StoreError> {
            self.city.clone().ok_or(StoreError::NotFound(ip))
        }

        fn lookup_isp(&self, ip: IpAddr) -> Result<Isp, StoreError> {
            self.isp.clone().ok_or(StoreError::NotFound(ip))
        }
    }

    fn city_record() -> CityRecord {
        CityRecord {
            country: Country {
                names: [("en".to_string(), "France".to_string())].into(),
                iso_code: Some("FR".into()),
            },
            ..Default::default()
        }
    }

    fn tor_index(ip: IpAddr) -> TorIndex {
        TorIndex::build(vec![TorNode {
            node_id: "EXIT1".into(),
            published: DateTime::<Utc>::default(),
            last_status: DateTime::<Utc>::default(),
            addresses: vec![ExitAddress {
                ip,
                observed_at: DateTime::<Utc>::default(),
            }],
        }])
    }

    #[test]
    fn test_isp_failure_is_not_fatal() {
        let city = FixedStore {
            city: Some(city_record()),
            isp: None,
        };
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        let location = resolve(ip, &city, &city, None, &LocationFormat::default())
            .expect("city lookup succeeds");
        assert!(location.isp.is_none());
        assert_eq!(location.country, "France");
        assert_eq!(location.location, "France");
    }

    #[test]
    fn test_city_failure_is_fatal() {
        let isp = FixedStore {
            city: None,
            isp: Some(Isp {
                isp: Some("Example Net".into()),
                ..Default::default()
            }),
        };
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        let result = resolve(ip, &isp, &isp, None, &LocationFormat::default());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_tor_membership() {
        let store = FixedStore {
            city: Some(city_record()),
            isp: None,
        };
        let exit: IpAddr = "198.51.100.9".parse().unwrap();
        let index = tor_index(exit);
        let format = LocationFormat::default();

        let hit = resolve(exit, &store, &store, Some(&index), &format).unwrap();
        assert_eq!(hit.tor_node.as_deref(), Some("EXIT1"));

        let other: IpAddr = "198.51.100.10".parse().unwrap();
        let miss = resolve(other, &store, &store, Some(&index), &format).unwrap();
        assert!(miss.tor_node.is_none());

        let no_index = resolve(exit, &store, &store, None, &format).unwrap();
        assert!(no_index.tor_node.is_none());
    }
}
