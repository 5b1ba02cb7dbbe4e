//! # Intensity Model
//!
//! Stateless estimate of shaking intensity from sparse earthquake parameters.
//! A PGA attenuation relation covers the far field; once that estimate passes
//! intensity 3 a PGV relation with a fault-length correction takes over.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::regions::{REGIONS, TAIWAN_CENTER};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.008;

/// Site amplification used when a region has none.
pub const DEFAULT_SITE_EFFECT: f64 = 1.751;

/// Hypocentre parameters needed by [`region_intensities`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Epicenter {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Focal depth in km.
    pub depth: f64,
    /// Magnitude.
    pub mag: f64,
}

impl Default for Epicenter {
    fn default() -> Self {
        Self {
            lat: TAIWAN_CENTER.0,
            lon: TAIWAN_CENTER.1,
            depth: 0.0,
            mag: 0.0,
        }
    }
}

/// Haversine central angle between two points, in radians.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Continuous intensity at `hypocenter_distance` km from a quake of `magnitude`.
///
/// A zero `site_effect` is replaced by [`DEFAULT_SITE_EFFECT`].
pub fn intensity(magnitude: f64, hypocenter_distance: f64, depth: f64, site_effect: f64) -> f64 {
    let site = if site_effect == 0.0 { DEFAULT_SITE_EFFECT } else { site_effect };

    let pga = 1.657 * (1.533 * magnitude).exp() * hypocenter_distance.powf(-1.607) * site;
    let mut i = 2.0 * pga.log10() + 0.7;

    if i > 3.0 {
        let fault_half_length = 10f64.powf(0.5 * magnitude - 1.85) / 2.0;
        let x = (hypocenter_distance - fault_half_length).max(3.0);
        let gpv600 = 10f64.powf(
            0.58 * magnitude + 0.0038 * depth
                - 1.29
                - (x + 0.0028 * 10f64.powf(0.5 * magnitude)).log10()
                - 0.002 * x,
        );
        let pgv = gpv600 * 1.31;
        i = 2.68 + 1.72 * pgv.log10();
    }

    i
}

/// Maps a continuous intensity onto the 0..=9 scale.
///
/// Below 4.5 values round half to even; from there on the buckets are
/// half-open so a boundary value lands in the higher one.
pub fn round_intensity(value: f64) -> u8 {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value < 4.5 {
        value.round_ties_even() as u8
    } else if value < 5.0 {
        5
    } else if value < 5.5 {
        6
    } else if value < 6.0 {
        7
    } else if value < 6.5 {
        8
    } else {
        9
    }
}

/// Localised label of a scale value.
pub fn intensity_label(level: u8) -> String {
    match level {
        0..=4 => format!("{}級", level),
        5 => "5弱".to_string(),
        6 => "5強".to_string(),
        7 => "6弱".to_string(),
        8 => "6強".to_string(),
        _ => "7級".to_string(),
    }
}

/// Continuous intensity for every known region, keyed by region code.
pub fn region_intensities(epicenter: &Epicenter) -> BTreeMap<String, f64> {
    let squared_depth = epicenter.depth.powi(2);

    REGIONS
        .iter()
        .map(|region| {
            let rad = distance(epicenter.lat, epicenter.lon, region.lat, region.lon);
            let real_distance = ((rad * EARTH_RADIUS_KM).powi(2) + squared_depth).sqrt();
            let value = intensity(epicenter.mag, real_distance, epicenter.depth, region.site_effect);
            (region.code.to_string(), value)
        })
        .collect()
}

/// [`region_intensities`] rounded onto the scale.
pub fn region_levels(epicenter: &Epicenter) -> BTreeMap<String, u8> {
    region_intensities(epicenter)
        .into_iter()
        .map(|(code, value)| (code, round_intensity(value)))
        .collect()
}
