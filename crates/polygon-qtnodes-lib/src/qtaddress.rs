//! Quadtree address codec
//!
//! An address is the literal root digit `'0'` followed by one digit per level.
//! Within a square of side `2 * half`, with `y` counted from the top row:
//!
//! | digit | column      | row         |
//! |-------|-------------|-------------|
//! | `'0'` | `x < half`  | `y >= half` |
//! | `'1'` | `x >= half` | `y >= half` |
//! | `'2'` | `x >= half` | `y < half`  |
//! | `'3'` | `x < half`  | `y < half`  |
//!
//! Grid traversal produces *paths*, which are addresses without the root digit.

use crate::utils;

/// Deepest level addressable by the quadtree
pub const MAX_LEVEL: u32 = 24;

/// Reasons a quadtree address cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Empty quadtree address")]
    Empty,

    #[error("Quadtree address must start with '0', found {0:?}")]
    BadRoot(char),

    #[error("Invalid quadtree digit {digit:?} at position {position}")]
    BadDigit { digit: char, position: usize },

    #[error("Quadtree address too deep: {0} levels (max {MAX_LEVEL})")]
    TooDeep(usize),
}

/// Build the depth-`z` address of the node at column `x`, row `y`
///
/// Returns an empty string if `z` is 0 or deeper than [`MAX_LEVEL`], or if
/// `x`/`y` do not fit in a `2^z` square.
pub fn convert_to_qt_node(x: u32, y: u32, z: u32) -> String {
    if z == 0 || z > MAX_LEVEL {
        return String::new();
    }

    let mut x = x;
    let mut y = y;
    let mut address = String::with_capacity(z as usize + 1);
    address.push('0');

    let mut half = 1u32 << (z - 1);
    for _ in 0..z {
        let digit = match (x >= half, y >= half) {
            (false, true) => {
                y -= half;
                '0'
            }
            (true, true) => {
                x -= half;
                y -= half;
                '1'
            }
            (true, false) => {
                x -= half;
                '2'
            }
            (false, false) => '3',
        };
        address.push(digit);
        half >>= 1;
    }

    if x != 0 || y != 0 {
        return String::new();
    }

    address
}

/// Decode an address into `(x, y, z)`
pub fn convert_from_qt_node(address: &str) -> Result<(u32, u32, u32), DecodeError> {
    let mut chars = address.chars();
    match chars.next() {
        None => return Err(DecodeError::Empty),
        Some('0') => {}
        Some(other) => return Err(DecodeError::BadRoot(other)),
    }

    let depth = address.len() - 1;
    if depth > MAX_LEVEL as usize {
        return Err(DecodeError::TooDeep(depth));
    }

    let z = depth as u32;
    let mut x = 0u32;
    let mut y = 0u32;
    let mut half = if z == 0 { 0 } else { 1u32 << (z - 1) };

    for (position, digit) in chars.enumerate() {
        match digit {
            '0' => y += half,
            '1' => {
                x += half;
                y += half;
            }
            '2' => x += half,
            '3' => {}
            _ => {
                return Err(DecodeError::BadDigit {
                    digit,
                    position: position + 1,
                });
            }
        }
        half >>= 1;
    }

    Ok((x, y, z))
}

/// Prefix a grid path with the root digit
#[inline]
pub fn qt_path_to_address(path: &str) -> String {
    let mut address = String::with_capacity(path.len() + 1);
    address.push('0');
    address.push_str(path);
    address
}

/// Strip the root digit from an address, validating it on the way
pub fn qt_address_to_path(address: &str) -> Result<&str, DecodeError> {
    convert_from_qt_node(address)?;
    Ok(&address[1..])
}

/// Append the Mercator addresses whose rows overlap the latitude band of a
/// flat (plate carrée) address
///
/// All emitted addresses keep the column and depth of the flat node; rows are
/// contiguous and in increasing order.
pub fn convert_flat_to_mercator_qt_addresses(
    flat_address: &str,
    out: &mut Vec<String>,
) -> Result<(), DecodeError> {
    let (x, y, z) = convert_from_qt_node(flat_address)?;
    if z == 0 {
        out.push(flat_address.to_string());
        return Ok(());
    }

    let size = 1u64 << z;
    let half = (size / 2) as f64;
    let quarter = (size / 4) as f64;
    let degrees_per_row = 180.0 / half;

    let max_lat = 90.0 - (y as f64 - quarter) * degrees_per_row;
    let min_lat = max_lat - degrees_per_row;

    let top = utils::lat_to_ypos(max_lat, z, true);
    let bottom = utils::lat_to_ypos(min_lat, z, true);
    out.extend((top..=bottom).map(|row| convert_to_qt_node(x, row, z)));

    Ok(())
}
