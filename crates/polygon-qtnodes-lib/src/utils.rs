//! Utility functions for latitude projections and row positions
//!
//! Two projections share one square quadtree: plate carrée ("flat"), where a
//! latitude maps linearly onto the middle half of the row space, and Web
//! Mercator, where the normalized `y = ln(tan(π/4 + lat·π/360))` in `[-π, π]`
//! maps linearly onto the full row space. Rows grow southwards.

use std::f64::consts::PI;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Precomputed constant: PI / 360.0
const LAT_TO_HALF_ANGLE: f64 = PI / 360.0;

/// Convert a latitude in degrees to normalized Web Mercator `y` in `[-π, π]`
///
/// Latitudes beyond [`MAX_MERCATOR_LATITUDE`] are clamped.
#[inline(always)]
pub fn mercator_lat_to_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    (PI / 4.0 + lat * LAT_TO_HALF_ANGLE).tan().ln()
}

/// Convert normalized Web Mercator `y` back to a latitude in degrees
#[inline(always)]
pub fn mercator_y_to_lat(y: f64) -> f64 {
    let y = y.clamp(-PI, PI);
    (2.0 * y.exp().atan() - PI / 2.0).to_degrees()
}

/// Latitude that lies halfway between `south` and `north` on the chosen projection
///
/// Flat is the arithmetic mean. Mercator averages the projected `y` values and
/// maps the mean back, so quadtree cells split into equal-height children.
#[inline]
pub fn bisect_latitudes(south: f64, north: f64, is_mercator: bool) -> f64 {
    if is_mercator {
        mercator_y_to_lat((mercator_lat_to_y(south) + mercator_lat_to_y(north)) / 2.0)
    } else {
        (south + north) / 2.0
    }
}

/// Map normalized Mercator `y` in `(-π, π)` onto a row index in `[0, 2^z)`
///
/// Values at or beyond either end are clamped to the first or last row.
pub fn y_to_ypos(y: f64, z: u32) -> u32 {
    let size = 1u64 << z;
    if y <= -PI {
        return 0;
    }
    if y >= PI {
        return (size - 1) as u32;
    }

    let pos = ((y + PI) / (2.0 * PI) * size as f64).floor() as u64;
    pos.min(size - 1) as u32
}

/// Row index in `[0, 2^z)` of the given latitude, north being the smaller row
///
/// Flat imagery only occupies the middle half of the row space: latitude 90
/// lands on row `2^z / 4` and latitude -90 on the last row of the band.
pub fn lat_to_ypos(lat: f64, z: u32, is_mercator: bool) -> u32 {
    if is_mercator {
        return y_to_ypos(-mercator_lat_to_y(lat), z);
    }

    let size = 1u64 << z;
    let half = size / 2;
    let quarter = size / 4;
    let lat = lat.clamp(-90.0, 90.0);
    let offset = ((90.0 - lat) / 180.0 * half as f64).floor() as u64;
    let last_row = (quarter + half).saturating_sub(1).max(quarter);

    (quarter + offset).min(last_row) as u32
}
