//! TOML configuration.
//!
//! Quantities with units are written as strings, e.g. `dta = "3 mm"`, and
//! parsed with `uom`'s parsers (doses with [`units::parse_dose`]); bare
//! numbers are rejected for such fields so that units are always explicit.

pub mod gamma;

use std::str::FromStr;

use serde::{Deserialize, Deserializer, de};

use units::{mm_, parse_dose, AbsorbedDose, Length};

use crate::error::Result;
use crate::geometric_info::GeometricInfo;
use crate::types::{Point, Vector};

pub use gamma::{read_config_file, GammaConfig};

pub(crate) fn deserialize_uom<'d, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    String::deserialize(deserializer)?
        .parse::<T>()
        .map_err(de::Error::custom)
}

pub(crate) fn deserialize_dose_opt<'d, D>(deserializer: D) -> std::result::Result<Option<AbsorbedDose>, D::Error>
where
    D: Deserializer<'d>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_dose(&s))
        .transpose()
        .map_err(de::Error::custom)
}

pub(crate) fn deserialize_uom_3d<'d, D, T>(deserializer: D) -> std::result::Result<(T, T, T), D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let (x, y, z) = <(String, String, String)>::deserialize(deserializer)?;
    tr_tup_res((x.parse(), y.parse(), z.parse()))
        .map_err(de::Error::custom)
}

pub(crate) fn deserialize_uom_3d_opt<'d, D, T>(deserializer: D) -> std::result::Result<Option<(T, T, T)>, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    Option::<(String, String, String)>::deserialize(deserializer)?
        .map(|(x, y, z)| tr_tup_res((x.parse(), y.parse(), z.parse())))
        .transpose()
        .map_err(de::Error::custom)
}

/// Transpose 3-tuple of `Result`
///
/// `Ok` if all elements `Ok`; if any element is an `Err` return the first one.
fn tr_tup_res<O, E>((x, y, z): (std::result::Result<O, E>, std::result::Result<O, E>, std::result::Result<O, E>))
    -> std::result::Result<(O, O, O), E>
{
    Ok((x?, y?, z?))
}

/// Axis-aligned grid on which raw dose files are laid out
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub nvoxels: (usize, usize, usize),

    #[serde(deserialize_with = "deserialize_uom_3d")]
    pub spacing: (Length, Length, Length),

    /// Centre of the first voxel; the world origin if omitted
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_uom_3d_opt")]
    pub origin: Option<(Length, Length, Length)>,
}

impl GridConfig {
    pub fn geometric_info(&self) -> Result<GeometricInfo> {
        let (nx, ny, nz) = self.nvoxels;
        let (sx, sy, sz) = self.spacing;
        let origin = self.origin
            .map_or_else(Point::origin, |(x, y, z)| Point::new(mm_(x), mm_(y), mm_(z)));
        GeometricInfo::axis_aligned([nx, ny, nz], Vector::new(mm_(sx), mm_(sy), mm_(sz)), origin)
    }
}
