// Whole dose pipelines, built only through the public API

use std::sync::Arc;

use float_eq::assert_float_eq;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use doseval::accessor::{GridDoseAccessor, Roi, StructureMaskAccessor, VoxelMaskAccessor};
use doseval::functor::{AddWeighted, BinaryFunctorAccessor, BinaryFunctorMaskAccessor, DoseMaskFunctorAccessor, DoseMaskMultiply, MaskAdd};
use doseval::gamma::{GammaIndex, GammaParameters};
use doseval::interpolation::InterpolationKind;
use doseval::iterator::{GridDoseIterator, MaskedDoseIterator};
use doseval::mappable::{Padding, RosuMappableAccessor, SimpleMappableAccessor, TransformationRef};
use doseval::dvh::Dvh;
use doseval::{DoseAccessor, DoseAccessorRef, DoseStatistics, Error, GeometricInfo, MaskAccessor, MaskAccessorRef, MaskVoxel, Point, Result, Vector};
use geometry::{Affine, Identity};

/// 6×6×6 voxels of 2 mm, first voxel centred on the world origin
fn grid() -> GeometricInfo {
    GeometricInfo::axis_aligned([6, 6, 6], Vector::repeat(2.0), Point::origin()).unwrap()
}

/// Dose rising by 1 Gy per mm along x, 1 Gy at x = 0
fn x_ramp() -> DoseAccessorRef {
    let info = grid();
    Arc::new(GridDoseAccessor::from_fn(info, |[x, _, _]| 1.0 + 2.0 * x as f64))
}

fn uniform(value: f64) -> DoseAccessorRef { Arc::new(GridDoseAccessor::filled(grid(), value)) }

#[test]
fn resample_subtract_and_summarize() -> Result<()> {
    let one_voxel_right: TransformationRef = Arc::new(Affine::translation(Vector::new(2.0, 0.0, 0.0)));
    let shifted: DoseAccessorRef = Arc::new(SimpleMappableAccessor::with_kind(
        grid(), x_ramp(), one_voxel_right, InterpolationKind::Trilinear, Padding::with_value(0.0),
    )?);

    // Voxels in the first x layer pull from outside the source grid and are padded
    assert_eq!(shifted.value_at_index([0, 3, 3])?, 0.0);
    assert_eq!(shifted.value_at_index([3, 3, 3])?, 5.0);

    let difference = BinaryFunctorAccessor::new(x_ramp(), shifted.clone(), |a: f64, b: f64| a - b)?;
    assert_eq!(difference.value_at_index([0, 0, 0])?, 1.0);
    for x in 1..6 {
        assert_eq!(difference.value_at_index([x, 5, 2])?, 2.0);
    }

    // Centres at x = 4, 6, 8, 10 mm fall inside the box
    let right: MaskAccessorRef = Arc::new(StructureMaskAccessor::new(grid(), Roi::Cuboid {
        min: Point::new( 3.0, -1.0, -1.0),
        max: Point::new(11.0, 11.0, 11.0),
    }.rasterize(1)));
    assert_eq!(right.relevant_voxels()?.len(), 4 * 36);

    let mut stats = DoseStatistics::new(MaskedDoseIterator::new(shifted, right)?);
    stats.init()?;
    assert_float_eq!(stats.mean()?, 6.0, abs <= 1e-12);
    assert_float_eq!(stats.variance()?, 5.0, abs <= 1e-9);
    assert_eq!(stats.minimum()?, 3.0);
    assert_eq!(stats.maximum()?, 9.0);
    assert_eq!(stats.volume()?, 144.0 * 8.0);
    assert_eq!(stats.vx(5.0)?, 108.0 * 8.0);
    // The hottest 72 voxels are those at 9 and 7 Gy
    assert_eq!(stats.dx(72.0 * 8.0)?, 7.0);
    assert_eq!(stats.max_ohx(72.0 * 8.0)?, 5.0);
    assert_eq!(stats.min_ocx(72.0 * 8.0)?, 7.0);
    assert_eq!(stats.maximum_voxel_ids()?.len(), 36);
    Ok(())
}

#[test]
fn rosu_and_simple_agree_on_linear_dose_in_the_interior() -> Result<()> {
    let identity = || -> TransformationRef { Arc::new(Identity) };
    let rosu   = RosuMappableAccessor  ::new(grid(), x_ramp(), identity(), Padding::reject())?;
    let simple = SimpleMappableAccessor::with_kind(grid(), x_ramp(), identity(), InterpolationKind::NearestNeighbor, Padding::reject())?;
    for x in 1..5 {
        let index = [x, 2, 3];
        assert_float_eq!(rosu.value_at_index(index)?, simple.value_at_index(index)?, abs <= 1e-9);
        assert_eq!(simple.value_at_index(index)?, x_ramp().value_at_index(index)?);
    }
    Ok(())
}

#[test]
fn gamma_of_scaled_dose_within_structure() -> Result<()> {
    // 2% higher everywhere, 3% criterion: gamma = 2/3
    let reference = uniform(10.0);
    let measured: DoseAccessorRef = Arc::new(BinaryFunctorAccessor::new(
        reference.clone(), reference.clone(), AddWeighted { w1: 1.02, w2: 0.0 })?);
    let parameters = GammaParameters {
        distance_to_agreement: 3.0,
        dose_difference_threshold: 0.03,
        sampling_rate: 2,
        use_local_dose: false,
        global_dose: 10.0,
    };
    let gamma: DoseAccessorRef = Arc::new(GammaIndex::new(measured, reference, None, parameters)?);

    let sphere: MaskAccessorRef = Arc::new(StructureMaskAccessor::new(grid(), Roi::Sphere {
        centre: Point::new(5.0, 5.0, 5.0),
        radius: 4.0,
    }.rasterize(3)));
    let mut stats = DoseStatistics::new(MaskedDoseIterator::new(gamma.clone(), sphere.clone())?);
    stats.init()?;
    assert_float_eq!(stats.mean()?, 2.0 / 3.0, abs <= 1e-9);
    assert_float_eq!(stats.maximum()?, 2.0 / 3.0, abs <= 1e-9);
    assert_float_eq!(stats.volume()?, sphere.relevant_voxels()?.iter().map(|v| v.relevant_fraction * 8.0).sum::<f64>(), abs <= 1e-9);
    Ok(())
}

#[test]
fn masked_dose_and_histogram() -> Result<()> {
    let info = grid();
    let left : MaskAccessorRef = Arc::new(VoxelMaskAccessor::new(info, vec![MaskVoxel::new(0, 1.0), MaskVoxel::new(1, 0.5)])?);
    let right: MaskAccessorRef = Arc::new(VoxelMaskAccessor::new(info, vec![MaskVoxel::new(1, 0.75), MaskVoxel::new(2, 0.25)])?);
    let union: MaskAccessorRef = Arc::new(BinaryFunctorMaskAccessor::new(left, right, MaskAdd)?);
    assert_eq!(union.relevant_voxels()?, &[
        MaskVoxel::new(0, 1.0),
        MaskVoxel::new(1, 1.0),
        MaskVoxel::new(2, 0.25),
    ]);

    let weighted: DoseAccessorRef = Arc::new(DoseMaskFunctorAccessor::new(x_ramp(), union.clone(), DoseMaskMultiply)?);
    assert_eq!(weighted.value_at(0)?, 1.0);
    assert_eq!(weighted.value_at(2)?, 0.25 * 5.0);
    assert_eq!(weighted.value_at(3)?, 0.0);

    let mut masked = MaskedDoseIterator::new(x_ramp(), union)?;
    let dvh = Dvh::from_iterator(&mut masked, 2.0)?;
    // doses 1, 3 and 5 with volumes 8, 8 and 2
    assert_eq!(dvh.differential(), &[8.0, 8.0, 2.0]);
    assert_eq!(dvh.cumulative(), vec![18.0, 10.0, 2.0]);
    Ok(())
}

#[test]
fn hundred_voxel_mask() -> Result<()> {
    let info = GeometricInfo::axis_aligned([100, 1, 1], Vector::repeat(1.0), Point::origin())?;
    let mask = VoxelMaskAccessor::new(info, (10..=30).map(|id| MaskVoxel::new(id, 1.0)).collect())?;
    assert_eq!(mask.mask_at(5)?, None);
    assert_eq!(mask.relevance_at(5)?, 0.0);
    assert_eq!(mask.mask_at(20)?, Some(MaskVoxel::new(20, 1.0)));
    Ok(())
}

#[test]
fn eight_voxel_statistics() -> Result<()> {
    let info = GeometricInfo::axis_aligned([2, 2, 2], Vector::repeat(1.0), Point::origin())?;
    let dose: DoseAccessorRef = Arc::new(GridDoseAccessor::new(info, (1..=8).map(f64::from).collect())?);
    let mut stats = DoseStatistics::new(GridDoseIterator::new(dose)?);
    stats.init()?;
    assert_eq!(stats.mean()?, 4.5);
    assert_float_eq!(stats.variance()?, 5.25, abs <= 1e-12);
    assert_eq!(stats.vx(4.5)?, 4.0);
    assert_eq!(stats.dx(4.0)?, 5.0);
    assert_eq!(stats.vx(0.0)?, stats.volume()?);
    assert_eq!(stats.dx(stats.volume()?)?, stats.minimum()?);
    Ok(())
}

#[test]
fn pipelines_reject_malformed_operands() {
    let other = GeometricInfo::axis_aligned([6, 6, 5], Vector::repeat(2.0), Point::origin()).unwrap();
    let odd: DoseAccessorRef = Arc::new(GridDoseAccessor::zeros(other));
    assert!(matches!(BinaryFunctorAccessor::new(x_ramp(), odd, AddWeighted { w1: 1.0, w2: 1.0 }), Err(Error::InvalidParameter(_))));
    assert!(matches!(GammaIndex::new(None, x_ramp(), None, GammaParameters::default()), Err(Error::NullReference(_))));
    assert!(matches!(RosuMappableAccessor::new(grid(), x_ramp(), None, Padding::default()), Err(Error::NullReference(_))));
    assert!(matches!(DoseStatistics::default().mean(), Err(Error::InvalidState(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn gamma_of_resampled_dose_against_itself_vanishes(
        values in proptest::collection::vec(0.5..20.0_f64, 216),
        dta    in 1.0..6.0_f64,
        rate   in 1..3_usize,
    ) {
        let info = grid();
        let dose: DoseAccessorRef = Arc::new(GridDoseAccessor::new(info, values).unwrap());
        let identity: TransformationRef = Arc::new(Identity);
        let copy: DoseAccessorRef = Arc::new(SimpleMappableAccessor::with_kind(
            info, dose.clone(), identity, InterpolationKind::NearestNeighbor, Padding::reject()).unwrap());
        let parameters = GammaParameters { distance_to_agreement: dta, sampling_rate: rate, global_dose: 20.0, ..Default::default() };
        let gamma = GammaIndex::new(copy, dose, None, parameters).unwrap();
        for id in (0..216).step_by(7) {
            assert_eq!(gamma.value_at(id).unwrap(), 0.0);
        }
    }
}
