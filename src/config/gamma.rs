//! Configuration file for gamma evaluation

use std::fs;
use std::path::Path;

use serde::Deserialize;

use units::{gray_, mm_, AbsorbedDose, Length};

use crate::gamma::GammaParameters;
use crate::interpolation::InterpolationKind;
use crate::mappable::Padding;
use super::{deserialize_dose_opt, deserialize_uom, GridConfig};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GammaConfig {

    /// Distance to agreement
    #[serde(deserialize_with = "deserialize_uom")]
    pub dta: Length,

    /// Dose difference criterion as a fraction, e.g. 0.03 for 3%
    pub dose_difference: f64,

    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: usize,

    /// Normalize the dose criterion to the local reference dose
    #[serde(default)]
    pub local: bool,

    /// Normalization dose for global gamma; the maximum reference dose if
    /// omitted
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_dose_opt")]
    pub global_dose: Option<AbsorbedDose>,

    #[serde(default)]
    pub interpolation: InterpolationKind,

    /// Grid of the measured dose, which is also the evaluation grid
    pub measured: GridConfig,

    /// Grid of the reference dose; the measured grid if omitted
    pub reference: Option<GridConfig>,

    /// Padding used when the reference is resampled onto the measured grid
    #[serde(default)]
    pub padding: Padding,
}

fn default_sampling_rate() -> usize { 3 }

impl GammaConfig {
    /// Gamma parameters, with `fallback_global_dose` (Gy) standing in for a
    /// missing `global_dose`
    pub fn parameters(&self, fallback_global_dose: f64) -> GammaParameters {
        GammaParameters {
            distance_to_agreement:     mm_(self.dta),
            dose_difference_threshold: self.dose_difference,
            sampling_rate:             self.sampling_rate,
            use_local_dose:            self.local,
            global_dose:               self.global_dose.map_or(fallback_global_dose, gray_),
        }
    }
}

pub fn read_config_file(path: &Path) -> Result<GammaConfig, Box<dyn std::error::Error>> {
    let config = fs::read_to_string(path)
        .map_err(|e| format!("Couldn't read config file `{}`: {e}", path.display()))?;
    Ok(toml::from_str(&config)?)
}
