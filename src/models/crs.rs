//! Coordinate reference system identifiers.

use proj4rs::proj::Proj;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A coordinate reference system, either an EPSG code or a PROJ.4 definition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Epsg(u16),
    Proj4(String),
}

impl Crs {
    /// WGS 84 geographic coordinates
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// Build the proj4rs projection for this CRS
    pub fn to_proj(&self) -> Result<Proj> {
        let proj = match self {
            Crs::Epsg(code) => Proj::from_epsg_code(*code),
            Crs::Proj4(def) => Proj::from_proj_string(def),
        };
        proj.map_err(|e| Error::Projection(format!("cannot build projection for {}: {:?}", self, e)))
    }

    /// Recover a CRS from the WKT of a shapefile `.prj` sidecar.
    ///
    /// Uses the outermost EPSG authority when present, and otherwise
    /// recognises unprojected WGS 84, NAD83 and NAD27 by datum name.
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        let wkt = wkt.trim();

        if let Some(code) = outer_epsg_authority(wkt) {
            return Some(Crs::Epsg(code));
        }

        if !wkt.starts_with("GEOGCS") && !wkt.starts_with("GEOGCRS") {
            return None;
        }

        let upper = wkt.to_ascii_uppercase();
        if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84") {
            Some(Crs::Epsg(4326))
        } else if upper.contains("NORTH_AMERICAN_1983") || upper.contains("NAD83") {
            Some(Crs::Epsg(4269))
        } else if upper.contains("NORTH_AMERICAN_1927") || upper.contains("NAD27") {
            Some(Crs::Epsg(4267))
        } else {
            None
        }
    }
}

/// EPSG code of an `AUTHORITY` (WKT1) or `ID` (WKT2) node that is a direct
/// child of the top-level node. Authorities nested in GEOGCS, DATUM, UNIT
/// and so on describe those components, not the CRS itself.
fn outer_epsg_authority(wkt: &str) -> Option<u16> {
    let mut depth = 0usize;
    let mut quoted = false;
    let mut found = None;

    for (pos, c) in wkt.char_indices() {
        match c {
            '"' => quoted = !quoted,
            _ if quoted => {}
            '[' | '(' => {
                if depth == 1 {
                    found = epsg_code(node_keyword(&wkt[..pos]), &wkt[pos + 1..]).or(found);
                }
                depth += 1;
            }
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    found
}

/// Keyword immediately before an opening bracket
fn node_keyword(head: &str) -> &str {
    let head = head.trim_end();
    let start = head
        .trim_end_matches(|c: char| c.is_ascii_alphanumeric() || c == '_')
        .len();
    &head[start..]
}

fn epsg_code(keyword: &str, args: &str) -> Option<u16> {
    if !keyword.eq_ignore_ascii_case("AUTHORITY") && !keyword.eq_ignore_ascii_case("ID") {
        return None;
    }
    let mut args = args.splitn(3, |c: char| c == ',' || c == ']' || c == ')');
    let authority = args.next()?.trim().trim_matches('"');
    if !authority.eq_ignore_ascii_case("EPSG") {
        return None;
    }
    args.next()?.trim().trim_matches('"').parse().ok()
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Proj4(def) => write!(f, "{}", def),
        }
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(code) = s
            .strip_prefix("EPSG:")
            .or_else(|| s.strip_prefix("epsg:"))
        {
            return code
                .parse()
                .map(Crs::Epsg)
                .map_err(|_| Error::Projection(format!("invalid EPSG code '{}'", code)));
        }
        if s.starts_with('+') {
            return Ok(Crs::Proj4(s.to_string()));
        }
        Err(Error::Projection(format!("unrecognised CRS '{}'", s)))
    }
}

impl TryFrom<String> for Crs {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}
