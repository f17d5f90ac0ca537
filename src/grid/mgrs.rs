//! Sentinel-2 tile identifiers: MGRS 100 km grid squares such as `32ULC`.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use geo::Coord;

use crate::projection::Transformer;
use crate::{Crs, Result, TilerError};

const BAND_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWXX";
// column letters repeat every third zone, row letters every other zone
const COLUMN_LETTERS: [&[u8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];
const ROW_LETTERS: [&[u8]; 2] = [b"ABCDEFGHJKLMNPQRSTUV", b"FGHJKLMNPQRSTUVABCDE"];
const SQUARE_SIZE: f64 = 100_000.0;

/// UTM zone number, including the Norway and Svalbard exceptions
pub fn utm_zone(lon: f64, lat: f64) -> u32 {
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }
    if (72.0..=84.0).contains(&lat) && lon >= 0.0 {
        match lon {
            l if l < 9.0 => return 31,
            l if l < 21.0 => return 33,
            l if l < 33.0 => return 35,
            l if l < 42.0 => return 37,
            _ => {}
        }
    }
    (((lon + 180.0) / 6.0).floor() as u32 + 1).clamp(1, 60)
}

/// Latitude band letter, `None` outside 80°S..84°N
pub fn latitude_band(lat: f64) -> Option<char> {
    if !(-80.0..=84.0).contains(&lat) {
        return None;
    }
    let index = (((lat + 80.0) / 8.0).floor() as usize).min(BAND_LETTERS.len() - 1);
    Some(BAND_LETTERS[index] as char)
}

/// Resolves lon/lat positions to Sentinel-2 tile ids, reusing one projection per UTM zone
#[derive(Default)]
pub struct MgrsLocator {
    transformers: HashMap<u32, Transformer>,
}

impl MgrsLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile_id(&mut self, lon: f64, lat: f64) -> Result<String> {
        let band = latitude_band(lat).ok_or_else(|| {
            TilerError::Projection(format!("Latitude {} is outside the MGRS range", lat))
        })?;
        let zone = utm_zone(lon, lat);
        let base = if band >= 'N' { 32600 } else { 32700 };
        let utm = Crs::epsg(base + zone);

        let transformer = match self.transformers.entry(utm.code()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Transformer::new(Crs::WGS84, utm)?),
        };
        let position = transformer.transform_coord(Coord { x: lon, y: lat })?;

        Ok(format!(
            "{:02}{}{}",
            zone,
            band,
            square_letters(position.x, position.y, zone)
        ))
    }
}

fn square_letters(easting: f64, northing: f64, zone: u32) -> String {
    let columns = COLUMN_LETTERS[((zone - 1) % 3) as usize];
    let rows = ROW_LETTERS[((zone - 1) % 2) as usize];

    // eastings start past the 100 km line because of the 500 km false origin
    let column = ((easting / SQUARE_SIZE).floor() as usize).clamp(1, columns.len()) - 1;
    let row = (northing / SQUARE_SIZE).floor() as usize % rows.len();

    format!("{}{}", columns[column] as char, rows[row] as char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_exceptions() {
        assert_eq!(utm_zone(6.83, 52.21), 32);
        assert_eq!(utm_zone(4.35, 50.85), 31);
        assert_eq!(utm_zone(5.3, 60.4), 32);
        assert_eq!(utm_zone(15.6, 78.2), 33);
    }

    #[test]
    fn test_latitude_band() {
        assert_eq!(latitude_band(52.21), Some('U'));
        assert_eq!(latitude_band(-33.9), Some('H'));
        assert_eq!(latitude_band(83.0), Some('X'));
        assert_eq!(latitude_band(85.0), None);
    }

    #[test]
    fn test_sentinel2_tile_ids() {
        let mut locator = MgrsLocator::new();
        assert_eq!(locator.tile_id(6.85, 52.21).unwrap(), "32ULC");
        assert_eq!(locator.tile_id(4.35, 50.85).unwrap(), "31UES");
        assert!(locator.tile_id(0.0, 86.0).is_err());
    }
}
