//! Moving whole grids between accessors and files

pub mod raw;

use std::path::Path;

use log::info;
use rayon::prelude::*;

use crate::accessor::{DoseAccessor, GridDoseAccessor};
use crate::error::{Error, Result};
use crate::geometric_info::GeometricInfo;
use crate::types::Dosef64;

/// Evaluate every voxel of `accessor`, in id order, in parallel. `tick` is
/// called once per evaluated voxel, from whichever thread evaluated it.
///
/// If several voxels fail, one of their errors is returned; which one depends
/// on scheduling.
pub fn pull(accessor: &dyn DoseAccessor, tick: impl Fn() + Sync + Send) -> Result<Vec<Dosef64>> {
    (0..accessor.grid_size())
        .into_par_iter()
        .map(|id| {
            let value = accessor.value_at(id);
            tick();
            value
        })
        .collect()
}

/// Write the values of any accessor as a raw `f32` stream. Nothing is written
/// if any voxel fails.
pub fn export_accessor(accessor: &dyn DoseAccessor, path: &Path) -> Result<()> {
    let values = pull(accessor, || {})?;
    raw::write(values.iter().map(|&v| v as f32), path)?;
    info!("wrote {} voxels of {} to {}", values.len(), accessor.uid(), path.display());
    Ok(())
}

/// Load a raw `f32` stream onto the grid described by `info`
pub fn import_grid(info: GeometricInfo, path: &Path) -> Result<GridDoseAccessor> {
    let data = raw::read(path)?
        .map(|v| v.map(Dosef64::from))
        .collect::<std::io::Result<Vec<_>>>()?;
    if data.len() != info.number_of_voxels() {
        return Err(Error::param(format!(
            "{} holds {} values, grid of size {:?} needs {}",
            path.display(), data.len(), info.n(), info.number_of_voxels()
        )));
    }
    GridDoseAccessor::new(info, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use pretty_assertions::assert_eq;
    use crate::accessor::DoseAccessorRef;
    use crate::functor::{Add, BinaryFunctorAccessor};
    use crate::geometric_info::cube;
    use crate::mappable::{Padding, SimpleMappableAccessor};
    use crate::interpolation::InterpolationKind;
    use geometry::{Affine, Transformation};
    use crate::types::Vector;

    fn ramp() -> DoseAccessorRef {
        Arc::new(GridDoseAccessor::from_fn(cube(3, 1.0), |[x, y, z]| (x + 3 * y + 9 * z) as f64))
    }

    #[test]
    fn export_then_import() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("sum.raw");
        let sum = BinaryFunctorAccessor::new(ramp(), ramp(), Add)?;
        export_accessor(&sum, &path)?;

        let reloaded = import_grid(cube(3, 1.0), &path)?;
        let expected: Vec<_> = (0..27).map(|i| 2.0 * i as f64).collect();
        assert_eq!(reloaded.data(), &expected[..]);
        Ok(())
    }

    #[test]
    fn pull_ticks_once_per_voxel() -> Result<()> {
        let count = AtomicUsize::new(0);
        let values = pull(ramp().as_ref(), || { count.fetch_add(1, Ordering::Relaxed); })?;
        assert_eq!(values.len(), 27);
        assert_eq!(count.into_inner(), 27);
        assert_eq!(values[13], 13.0);
        Ok(())
    }

    #[test]
    fn export_fails_on_accessor_error() -> Result<()> {
        let dir = tempdir()?;
        let shift: Arc<dyn Transformation> = Arc::new(Affine::translation(Vector::new(10.0, 0.0, 0.0)));
        let outside = SimpleMappableAccessor::with_kind(cube(3, 1.0), ramp(), shift, InterpolationKind::Trilinear, Padding::reject())?;
        let path = dir.path().join("outside.raw");
        assert!(matches!(export_accessor(&outside, &path), Err(Error::MappingOutsideImage(_))));
        assert!(!path.exists());
        Ok(())
    }

    /// Fails differently on the two halves of the grid
    struct TwoFaults { info: GeometricInfo }

    impl DoseAccessor for TwoFaults {
        fn geometric_info(&self) -> &GeometricInfo { &self.info }
        fn value_at(&self, id: usize) -> Result<Dosef64> {
            if id < self.grid_size() / 2 { Err(Error::state(format!("early {id}"))) }
            else                         { Err(Error::outside(format!("late {id}"))) }
        }
        fn uid(&self) -> &str { "two-faults" }
    }

    #[test]
    fn pull_reports_one_of_several_errors() {
        let faulty = TwoFaults { info: cube(8, 1.0) };
        for _ in 0..10 {
            match pull(&faulty, || {}) {
                Err(Error::InvalidState(_) | Error::MappingOutsideImage(_)) => {},
                other => panic!("expected an accessor error, got {other:?}"),
            }
        }
    }

    #[test]
    fn import_checks_voxel_count() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("short.raw");
        raw::write([1.0_f32, 2.0].into_iter(), &path)?;
        assert!(matches!(import_grid(cube(2, 1.0), &path), Err(Error::InvalidParameter(_))));
        assert!(matches!(import_grid(cube(2, 1.0), &dir.path().join("absent.raw")), Err(Error::Io(_))));
        Ok(())
    }
}
