//! Dose-volume statistics over one traversal of a [`DoseIterator`].
//!
//! Volumes are expressed in the unit of the iterator's voxel volume (mm³ for
//! the accessors of this crate). Each sample contributes
//! `relevant_fraction · voxel_volume` of volume.

use log::debug;
use ordered_float::NotNan;

use crate::error::{Error, Result};
use crate::iterator::DoseIterator;
use crate::types::{Dosef64, Fractionf64, Volumef64, VoxelGridId};

/// Variances below this are reported as exactly zero
const VARIANCE_EPS: f64 = 1e-12;

/// Slack when comparing accumulated volumes against a requested volume
const VOLUME_EPS: Volumef64 = 1e-9;

#[derive(Clone, Copy, Debug)]
struct Entry {
    dose: NotNan<Dosef64>,
    weight: Fractionf64,
    id: VoxelGridId,
}

/// Aggregates of one completed traversal. Entries are sorted by ascending
/// dose; ties keep traversal order.
#[derive(Clone, Debug)]
struct Summary {
    entries: Vec<Entry>,
    voxel_volume: Volumef64,
    weight_sum: f64,
    mean: Dosef64,
    variance: f64,
}

impl Summary {
    fn volume_of(&self, e: &Entry) -> Volumef64 { e.weight * self.voxel_volume }

    fn minimum(&self) -> Dosef64 { self.entries.first().map_or(f64::NAN, |e| e.dose.into_inner()) }
    fn maximum(&self) -> Dosef64 { self.entries.last ().map_or(f64::NAN, |e| e.dose.into_inner()) }

    /// Position (in `order`) of the entry at which the accumulated volume
    /// first reaches `volume`
    fn crossing<'a>(&self, order: impl Iterator<Item = (usize, &'a Entry)>, volume: Volumef64) -> Option<usize> {
        let mut accumulated = 0.0;
        for (position, e) in order {
            accumulated += self.volume_of(e);
            if accumulated >= volume - VOLUME_EPS { return Some(position) }
        }
        None
    }

    /// Volume-weighted mean dose of the first `volume` worth of entries
    fn partial_mean<'a>(&self, order: impl Iterator<Item = &'a Entry>, volume: Volumef64) -> Dosef64 {
        let mut remaining = volume;
        let mut integral = 0.0;
        let mut taken = 0.0;
        for e in order {
            if remaining <= 0.0 { break }
            let portion = self.volume_of(e).min(remaining);
            integral += portion * e.dose.into_inner();
            taken += portion;
            remaining -= portion;
        }
        integral / taken
    }
}

/// Dose statistics bound to a dose iterator.
///
/// Binding an iterator discards earlier results; every query fails with
/// `InvalidState` until [`DoseStatistics::init`] has succeeded.
#[derive(Default)]
pub struct DoseStatistics {
    iterator: Option<Box<dyn DoseIterator>>,
    summary: Option<Summary>,
}

impl DoseStatistics {
    pub fn new(iterator: impl DoseIterator + 'static) -> Self {
        Self { iterator: Some(Box::new(iterator)), summary: None }
    }

    pub fn set_dose_iterator(&mut self, iterator: Box<dyn DoseIterator>) {
        self.iterator = Some(iterator);
        self.summary = None;
    }

    pub fn is_initialized(&self) -> bool { self.summary.is_some() }

    /// Traverse the bound iterator once, from its start. On failure the
    /// statistics stay uninitialized.
    pub fn init(&mut self) -> Result<()> {
        self.summary = None;
        let iterator = self.iterator.as_mut()
            .ok_or_else(|| Error::null("dose statistics have no dose iterator"))?;
        iterator.reset();

        let mut entries = vec![];
        let (mut weight_sum, mut sum, mut sum_of_squares) = (0.0, 0.0, 0.0);
        for sample in iterator.by_ref() {
            let sample = sample?;
            if sample.relevant_fraction <= 0.0 { continue }
            let dose = NotNan::new(sample.value)
                .map_err(|_| Error::param(format!("dose at voxel {} is NaN", sample.id)))?;
            let w = sample.relevant_fraction;
            weight_sum     += w;
            sum            += w * sample.value;
            sum_of_squares += w * sample.value * sample.value;
            entries.push(Entry { dose, weight: w, id: sample.id });
        }
        if entries.is_empty() {
            return Err(Error::param(format!("dose iterator {} yielded no relevant voxels", iterator.uid())));
        }
        entries.sort_by_key(|e| e.dose);

        let mean = sum / weight_sum;
        let variance = sum_of_squares / weight_sum - mean * mean;
        let variance = if variance < VARIANCE_EPS { 0.0 } else { variance };
        debug!("dose statistics over {}: {} voxels, mean {mean:.4}", iterator.uid(), entries.len());
        self.summary = Some(Summary { entries, voxel_volume: iterator.voxel_volume(), weight_sum, mean, variance });
        Ok(())
    }

    fn summary(&self) -> Result<&Summary> {
        self.summary.as_ref().ok_or_else(|| Error::state("dose statistics queried before init()"))
    }

    pub fn mean    (&self) -> Result<Dosef64> { Ok(self.summary()?.mean) }
    pub fn variance(&self) -> Result<f64>     { Ok(self.summary()?.variance) }
    pub fn std_dev (&self) -> Result<Dosef64> { Ok(self.summary()?.variance.sqrt()) }
    pub fn minimum (&self) -> Result<Dosef64> { Ok(self.summary()?.minimum()) }
    pub fn maximum (&self) -> Result<Dosef64> { Ok(self.summary()?.maximum()) }

    /// Sum of relevant fractions
    pub fn number_of_voxels(&self) -> Result<f64> { Ok(self.summary()?.weight_sum) }

    /// Total relevant volume
    pub fn volume(&self) -> Result<Volumef64> {
        let s = self.summary()?;
        Ok(s.weight_sum * s.voxel_volume)
    }

    /// Volume receiving at least `dose`
    pub fn vx(&self, dose: Dosef64) -> Result<Volumef64> {
        let s = self.summary()?;
        let first = s.entries.partition_point(|e| e.dose.into_inner() < dose);
        Ok(s.entries[first..].iter().map(|e| s.volume_of(e)).sum())
    }

    /// Minimum dose received by the hottest `volume`: walks down from the
    /// maximum until `volume` has been accumulated. The minimum dose if the
    /// whole structure is smaller than `volume`.
    pub fn dx(&self, volume: Volumef64) -> Result<Dosef64> {
        let s = self.summary()?;
        Ok(s.crossing(s.entries.iter().enumerate().rev(), volume)
            .map_or_else(|| s.minimum(), |i| s.entries[i].dose.into_inner()))
    }

    /// Mean dose of the hottest `volume`
    pub fn mohx(&self, volume: Volumef64) -> Result<Dosef64> {
        let s = self.summary()?;
        if volume <= 0.0 { return Ok(s.maximum()) }
        Ok(s.partial_mean(s.entries.iter().rev(), volume))
    }

    /// Mean dose of the coldest `volume`
    pub fn mocx(&self, volume: Volumef64) -> Result<Dosef64> {
        let s = self.summary()?;
        if volume <= 0.0 { return Ok(s.minimum()) }
        Ok(s.partial_mean(s.entries.iter(), volume))
    }

    /// Highest dose outside the hottest `volume`: the entry just below the
    /// [`dx`](Self::dx) crossing. The minimum dose if nothing lies below it.
    pub fn max_ohx(&self, volume: Volumef64) -> Result<Dosef64> {
        let s = self.summary()?;
        let beyond = s.crossing(s.entries.iter().enumerate().rev(), volume)
            .and_then(|i| i.checked_sub(1));
        Ok(beyond.map_or_else(|| s.minimum(), |i| s.entries[i].dose.into_inner()))
    }

    /// Lowest dose outside the coldest `volume`: the entry just above the
    /// crossing when walking up from the minimum. The maximum dose if nothing
    /// lies above it.
    pub fn min_ocx(&self, volume: Volumef64) -> Result<Dosef64> {
        let s = self.summary()?;
        let beyond = s.crossing(s.entries.iter().enumerate(), volume)
            .map(|i| i + 1)
            .filter(|&i| i < s.entries.len());
        Ok(beyond.map_or_else(|| s.maximum(), |i| s.entries[i].dose.into_inner()))
    }

    /// Ids of all voxels attaining the maximum dose
    pub fn maximum_voxel_ids(&self) -> Result<Vec<VoxelGridId>> {
        let s = self.summary()?;
        let max = s.maximum();
        Ok(s.entries.iter().rev()
           .take_while(|e| e.dose.into_inner() == max)
           .map(|e| e.id)
           .collect())
    }

    /// Ids of the `n` lowest-dose voxels, lowest first
    pub fn minimum_voxel_ids(&self, n: usize) -> Result<Vec<VoxelGridId>> {
        Ok(self.summary()?.entries.iter().take(n).map(|e| e.id).collect())
    }
}
