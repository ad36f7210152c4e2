//! Dose-volume histograms

use log::debug;
use ndhistogram::{axis::Uniform, ndhistogram, Histogram};

use crate::error::{Error, Result};
use crate::iterator::DoseIterator;
use crate::types::{Dosef64, Volumef64};

/// Upper limit on the number of dose bins of one histogram
pub const MAX_BINS: usize = 1 << 20;

/// Volume per dose bin of one traversal. Bin `i` covers doses
/// `[i·bin_width, (i+1)·bin_width)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dvh {
    bin_width: Dosef64,
    differential: Vec<Volumef64>,
    number_of_voxels: f64,
}

impl Dvh {
    /// Traverse `iterator` once from its start
    pub fn from_iterator(iterator: &mut dyn DoseIterator, bin_width: Dosef64) -> Result<Self> {
        if !(bin_width > 0.0 && bin_width.is_finite()) {
            return Err(Error::param(format!("DVH bin width must be positive, got {bin_width}")))
        }
        iterator.reset();
        let voxel_volume = iterator.voxel_volume();
        let mut samples = vec![];
        for sample in &mut *iterator {
            let sample = sample?;
            if !(sample.value >= 0.0 && sample.value.is_finite()) {
                return Err(Error::param(format!("DVH of invalid dose {} at voxel {}", sample.value, sample.id)));
            }
            samples.push((sample.value, sample.relevant_fraction));
        }
        let number_of_voxels: f64 = samples.iter().map(|(_, fraction)| fraction).sum();
        let Some(max) = samples.iter().map(|&(value, _)| value).reduce(f64::max) else {
            return Ok(Self { bin_width, differential: vec![], number_of_voxels })
        };

        let nbins = (max / bin_width).floor() + 1.0;
        if nbins > MAX_BINS as f64 {
            return Err(Error::param(format!(
                "DVH up to {max} Gy in bins of {bin_width} Gy needs more than {MAX_BINS} bins")))
        }
        let nbins = nbins as usize;
        let mut h = ndhistogram!(Uniform::new(nbins, 0.0, nbins as f64 * bin_width); Volumef64);
        for (value, fraction) in samples {
            h.fill_with(&value, fraction * voxel_volume);
        }
        let bin_volume = |i: usize| *h.value(&((i as f64 + 0.5) * bin_width)).unwrap_or(&0.0);
        let mut differential: Vec<Volumef64> = (0..nbins).map(bin_volume).collect();
        // Rounding can push the maximum dose just past the top edge
        let overflow = *h.value(&((nbins + 1) as f64 * bin_width)).unwrap_or(&0.0);
        if let Some(last) = differential.last_mut() { *last += overflow }

        debug!("DVH of {}: {nbins} bins of {bin_width}", iterator.uid());
        Ok(Self { bin_width, differential, number_of_voxels })
    }

    pub fn bin_width(&self) -> Dosef64 { self.bin_width }

    /// Lower dose edge of bin `i`
    pub fn dose_at(&self, i: usize) -> Dosef64 { i as f64 * self.bin_width }

    pub fn differential(&self) -> &[Volumef64] { &self.differential }

    /// Volume receiving at least the lower edge of each bin
    pub fn cumulative(&self) -> Vec<Volumef64> {
        let mut cumulative = self.differential.clone();
        for i in (0..cumulative.len().saturating_sub(1)).rev() {
            cumulative[i] += cumulative[i + 1];
        }
        cumulative
    }

    pub fn total_volume(&self) -> Volumef64 { self.differential.iter().sum() }

    /// Sum of relevant fractions
    pub fn number_of_voxels(&self) -> f64 { self.number_of_voxels }
}
