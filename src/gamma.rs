//! Gamma index: spatial and dosimetric agreement between a measured and a
//! reference dose distribution.
//!
//! For each evaluation point `P` the reference dose is searched within a
//! sphere of radius DTA (distance to agreement) around `P`. Every candidate
//! offset `o` is scored as
//!
//! ```text
//!   sqrt( |o|²/DTA²  +  (ref(P+o) - measured(P))² / threshold² )
//! ```
//!
//! and the gamma value is the smallest score, capped at 1. The candidate
//! offsets and their distance penalties depend only on DTA and the sampling
//! rate, so they are tabulated once, sorted by distance penalty, which allows
//! the search to stop as soon as no remaining offset can improve on the best
//! score so far.

use itertools::{iproduct, Itertools};
use log::debug;

use crate::accessor::{new_uid, require, DoseAccessor, DoseAccessorRef};
use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::interpolation::{Interpolation, InterpolationKind};
use crate::types::{Dosef64, Fractionf64, Lengthf64, Vector, VoxelGridId};

/// Parameters of the gamma evaluation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GammaParameters {
    /// Search radius in mm
    pub distance_to_agreement: Lengthf64,

    /// Dose difference criterion, as a fraction of the normalization dose
    pub dose_difference_threshold: Fractionf64,

    /// Search points per axis within the DTA radius
    pub sampling_rate: usize,

    /// Normalize to the local reference dose rather than to `global_dose`
    pub use_local_dose: bool,

    pub global_dose: Dosef64,
}

impl Default for GammaParameters {
    fn default() -> Self {
        Self {
            distance_to_agreement: 3.0,
            dose_difference_threshold: 0.03,
            sampling_rate: 3,
            use_local_dose: false,
            global_dose: 1.0,
        }
    }
}

/// One candidate search offset
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenaltyEntry {
    pub offset: Vector,
    /// `|offset|² / DTA²`
    pub penalty: f64,
    /// Score of this offset if the doses agreed perfectly
    pub penalty_with_zero_dose_diff: f64,
}

/// Offsets on a cubic lattice of `2·rate + 1` points per axis spanning
/// `[-dta, dta]`, restricted to the DTA sphere, sorted by penalty (the zero
/// offset comes first).
pub fn penalty_table(dta: Lengthf64, rate: usize) -> Vec<PenaltyEntry> {
    let n = rate as isize;
    let step = dta / rate as f64;
    iproduct!(-n..=n, -n..=n, -n..=n)
        .map(|(i, j, k)| {
            let offset = Vector::new(i as f64, j as f64, k as f64) * step;
            let penalty = offset.norm_squared() / (dta * dta);
            PenaltyEntry { offset, penalty, penalty_with_zero_dose_diff: penalty.sqrt() }
        })
        .filter(|e| e.penalty <= 1.0 + 1e-12)
        .sorted_by(|a, b| a.penalty.total_cmp(&b.penalty))
        .collect()
}

fn check_search_parameters(dta: Lengthf64, rate: usize) -> Result<()> {
    if !(dta > 0.0) { return Err(Error::param(format!("distance to agreement must be positive, got {dta}"))) }
    if rate == 0    { return Err(Error::param("gamma sampling rate must be at least 1")) }
    Ok(())
}

/// Accessor whose value at each voxel of the evaluation geometry is the gamma
/// index at that voxel's centre.
pub struct GammaIndex {
    measured: DoseAccessorRef,
    reference: DoseAccessorRef,
    evaluation: GeometricInfo,
    measured_interpolation: Box<dyn Interpolation>,
    reference_interpolation: Box<dyn Interpolation>,
    parameters: GammaParameters,
    table: Vec<PenaltyEntry>,
    uid: String,
}

impl GammaIndex {

    /// `evaluation` defaults to the geometry of `measured`. Both doses are
    /// sampled trilinearly unless [`GammaIndex::with_interpolation`] says
    /// otherwise.
    pub fn new(
        measured: impl Into<Option<DoseAccessorRef>>,
        reference: impl Into<Option<DoseAccessorRef>>,
        evaluation: Option<GeometricInfo>,
        parameters: GammaParameters,
    ) -> Result<Self> {
        let measured  = require(measured .into(), "gamma index needs a measured dose")?;
        let reference = require(reference.into(), "gamma index needs a reference dose")?;
        check_search_parameters(parameters.distance_to_agreement, parameters.sampling_rate)?;
        if !(parameters.dose_difference_threshold >= 0.0) {
            return Err(Error::param("dose difference threshold must not be negative"));
        }
        let evaluation = evaluation.unwrap_or(*measured.geometric_info());
        let kind = InterpolationKind::Trilinear;
        let measured_interpolation  = kind.bound_to(measured .clone());
        let reference_interpolation = kind.bound_to(reference.clone());
        let table = penalty_table(parameters.distance_to_agreement, parameters.sampling_rate);
        debug!("gamma index of {} against {}: {} search offsets", measured.uid(), reference.uid(), table.len());
        Ok(Self {
            measured, reference, evaluation,
            measured_interpolation, reference_interpolation,
            parameters, table, uid: new_uid(),
        })
    }

    pub fn with_interpolation(mut self, kind: InterpolationKind) -> Self {
        self.measured_interpolation  = kind.bound_to(self.measured .clone());
        self.reference_interpolation = kind.bound_to(self.reference.clone());
        self
    }

    pub fn parameters(&self) -> &GammaParameters { &self.parameters }
    pub fn penalty_table(&self) -> &[PenaltyEntry] { &self.table }

    pub fn set_distance_to_agreement(&mut self, dta: Lengthf64) -> Result<()> {
        check_search_parameters(dta, self.parameters.sampling_rate)?;
        self.parameters.distance_to_agreement = dta;
        self.regenerate_table();
        Ok(())
    }

    pub fn set_sampling_rate(&mut self, rate: usize) -> Result<()> {
        check_search_parameters(self.parameters.distance_to_agreement, rate)?;
        self.parameters.sampling_rate = rate;
        self.regenerate_table();
        Ok(())
    }

    pub fn set_dose_difference_threshold(&mut self, ddt: Fractionf64) -> Result<()> {
        if !(ddt >= 0.0) { return Err(Error::param("dose difference threshold must not be negative")) }
        self.parameters.dose_difference_threshold = ddt;
        Ok(())
    }

    pub fn set_use_local_dose(&mut self, local: bool) { self.parameters.use_local_dose = local }
    pub fn set_global_dose(&mut self, dose: Dosef64) { self.parameters.global_dose = dose }

    fn regenerate_table(&mut self) {
        let GammaParameters { distance_to_agreement, sampling_rate, .. } = self.parameters;
        self.table = penalty_table(distance_to_agreement, sampling_rate);
        debug!("gamma index {}: regenerated {} search offsets", self.uid, self.table.len());
    }
}

impl DoseAccessor for GammaIndex {
    fn geometric_info(&self) -> &GeometricInfo { &self.evaluation }

    fn value_at(&self, id: VoxelGridId) -> Result<Dosef64> {
        let p = self.evaluation.id_to_world(id)
            .ok_or_else(|| Error::param(format!("voxel id {id} outside gamma evaluation grid")))?;
        let GammaParameters { dose_difference_threshold, use_local_dose, global_dose, .. } = self.parameters;

        let measured = self.measured_interpolation.value(&p)?;
        let normalization = if use_local_dose { self.reference_interpolation.value(&p)? } else { global_dose };
        let threshold = normalization * dose_difference_threshold;
        let threshold_squared = threshold * threshold;
        if threshold_squared == 0.0 { return Ok(f64::NAN) }

        let reference_info = self.reference.geometric_info();
        let mut best = 1.0;
        for entry in &self.table {
            // Sorted: no later entry can beat `best` either
            if entry.penalty_with_zero_dose_diff >= best { break }
            let candidate = p + entry.offset;
            if !self.evaluation.is_inside(&candidate) || !reference_info.is_inside(&candidate) { continue }
            let difference = self.reference_interpolation.value(&candidate)? - measured;
            let score = (entry.penalty + difference * difference / threshold_squared).sqrt();
            if score < best { best = score }
        }
        Ok(best)
    }

    fn uid(&self) -> &str { &self.uid }
}
