// Calculs géographiques pour tours-within et distances

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometers,
}

impl Unit {
    /// "mi" = miles, toute autre valeur = kilomètres
    pub fn parse(raw: &str) -> Self {
        if raw == "mi" { Unit::Miles } else { Unit::Kilometers }
    }

    /// Rayon de la Terre dans l'unité
    pub fn earth_radius(self) -> f64 {
        match self {
            Unit::Miles => 3963.2,
            Unit::Kilometers => 6378.1,
        }
    }

    /// Conversion depuis des mètres
    pub fn from_meters(self, meters: f64) -> f64 {
        match self {
            Unit::Miles => meters * 0.000621371,
            Unit::Kilometers => meters * 0.001,
        }
    }
}

const EARTH_RADIUS_METERS: f64 = 6_378_100.0;

/// "34.111745,-118.113491" -> (lat, lng)
pub fn parse_lat_lng(raw: &str) -> Result<(f64, f64), AppError> {
    let invalid = || {
        AppError::bad_request("Please provide latitude and longitude in the format lat,lng.")
    };

    let (lat, lng) = raw.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(invalid());
    }
    Ok((lat, lng))
}

/// Distance orthodromique (haversine) en mètres
pub fn haversine_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lng2) = (to.0.to_radians(), to.1.to_radians());

    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

/// Vrai si `point` est dans le cercle de rayon `distance` (exprimé en `unit`)
pub fn within(center: (f64, f64), point: (f64, f64), distance: f64, unit: Unit) -> bool {
    // distance / rayon = angle en radians, identique quelle que soit l'unité
    let radians = distance / unit.earth_radius();
    haversine_meters(center, point) / EARTH_RADIUS_METERS <= radians
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOS_ANGELES: (f64, f64) = (34.052235, -118.243683);
    const SAN_FRANCISCO: (f64, f64) = (37.774929, -122.419416);

    #[test]
    fn test_parse_lat_lng() {
        assert_eq!(parse_lat_lng("34.111745,-118.113491").unwrap(), (34.111745, -118.113491));
        assert!(parse_lat_lng("34.111745").is_err());
        assert!(parse_lat_lng("abc,def").is_err());
        assert!(parse_lat_lng("95,10").is_err());
    }

    #[test]
    fn test_haversine_known_distance() {
        let km = Unit::Kilometers.from_meters(haversine_meters(LOS_ANGELES, SAN_FRANCISCO));
        assert!((km - 559.0).abs() < 5.0, "got {km}");
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(Unit::parse("mi"), Unit::Miles);
        assert_eq!(Unit::parse("km"), Unit::Kilometers);
        assert!((Unit::Miles.from_meters(1609.34) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_within() {
        assert!(within(LOS_ANGELES, SAN_FRANCISCO, 400.0, Unit::Miles));
        assert!(!within(LOS_ANGELES, SAN_FRANCISCO, 300.0, Unit::Miles));
        assert!(within(LOS_ANGELES, SAN_FRANCISCO, 600.0, Unit::Kilometers));
    }
}
