//! # Earthquake Module
//!
//! Pure numerical model and static reference data. Nothing in here performs
//! I/O or holds state.
//!
//! - **`intensity`**: haversine distance, the PGA/PGV intensity estimate,
//!   rounding onto the 0..=9 scale and its localised labels.
//! - **`regions`**: the county table (centre, site effect, postal ranges) and
//!   the ZIP3 township names.

/// Intensity physics.
pub mod intensity;
/// Region and township reference tables.
pub mod regions;

pub use intensity::{
    distance, intensity, intensity_label, region_intensities, region_levels, round_intensity,
    Epicenter,
};
pub use regions::{county_for_zip, region_by_code, region_by_name, town_display, Region, REGIONS};
