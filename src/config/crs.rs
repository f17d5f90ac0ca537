use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Result, TilerError};

/// An EPSG-coded coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Crs {
    epsg: u32,
}

impl Crs {
    /// WGS84 longitude/latitude
    pub const WGS84: Crs = Crs { epsg: 4326 };
    /// ETRS89 / LAEA Europe
    pub const LAEA_EUROPE: Crs = Crs { epsg: 3035 };

    /// Create a CRS from an EPSG code
    pub const fn epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// The EPSG code
    pub fn code(&self) -> u32 {
        self.epsg
    }

    /// Whether coordinates in this CRS are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        match self.proj_string() {
            Some(proj) => proj.contains("+proj=longlat"),
            None => self.epsg == 4326 || (4000..5000).contains(&self.epsg),
        }
    }

    /// PROJ.4 definition from the bundled EPSG database
    pub fn proj_string(&self) -> Option<&'static str> {
        u16::try_from(self.epsg)
            .ok()
            .and_then(crs_definitions::from_code)
            .map(|def| def.proj4)
    }

    /// Parse the many spellings of a CRS found in grid files and bbox dicts
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper == "OGC:CRS84" || upper == "CRS84" || upper.ends_with(":CRS84") {
            return Ok(Self::WGS84);
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") {
            // urn:ogc:def:crs:EPSG::3035 or urn:ogc:def:crs:EPSG:9.9:3035
            upper.rsplit(':').next().unwrap_or_default()
        } else {
            upper.as_str()
        };

        code.parse::<u32>()
            .map(Self::epsg)
            .map_err(|_| TilerError::Parse(format!("Unrecognized CRS '{}'", value)))
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl FromStr for Crs {
    type Err = TilerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCrs {
            Code(u32),
            Text(String),
        }

        match RawCrs::deserialize(deserializer)? {
            RawCrs::Code(code) => Ok(Crs::epsg(code)),
            RawCrs::Text(text) => Crs::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!(Crs::parse("EPSG:3035").unwrap(), Crs::LAEA_EUROPE);
        assert_eq!(Crs::parse("epsg:4326").unwrap(), Crs::WGS84);
        assert_eq!(Crs::parse("3035").unwrap(), Crs::LAEA_EUROPE);
        assert_eq!(
            Crs::parse("urn:ogc:def:crs:EPSG::32631").unwrap(),
            Crs::epsg(32631)
        );
        assert_eq!(Crs::parse("OGC:CRS84").unwrap(), Crs::WGS84);
        assert!(Crs::parse("not-a-crs").is_err());
    }

    #[test]
    fn test_geographic_detection() {
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs::LAEA_EUROPE.is_geographic());
        assert!(!Crs::epsg(32631).is_geographic());
    }

    #[test]
    fn test_serde_accepts_string_and_integer() {
        let from_int: Crs = serde_json::from_str("3035").unwrap();
        let from_str: Crs = serde_json::from_str("\"EPSG:3035\"").unwrap();
        assert_eq!(from_int, from_str);
        assert_eq!(serde_json::to_string(&from_int).unwrap(), "\"EPSG:3035\"");
    }
}
