//! Lazy evaluation of radiotherapy dose grids.
//!
//! Dose distributions, masks and derived quantities are represented as
//! [accessors](accessor): nodes of a graph which compute the value of any
//! voxel on demand by pulling values from their operands. Resampling
//! ([`mappable`]), voxel-wise arithmetic ([`functor`]) and the [`gamma`]
//! index are accessors themselves, so they compose freely; [`statistics`]
//! and [`dvh`] consume a pipeline through a [`DoseIterator`].

pub mod error;
pub mod types;
pub mod index;
pub mod geometric_info;
pub mod accessor;
pub mod interpolation;
pub mod mappable;
pub mod functor;
pub mod gamma;
pub mod iterator;
pub mod statistics;
pub mod dvh;
pub mod io;
pub mod config;

pub use error::{Error, Result};
pub use types::{Point, Vector};
pub use geometric_info::GeometricInfo;
pub use accessor::{DoseAccessor, DoseAccessorRef, MaskAccessor, MaskAccessorRef, MaskVoxel};
pub use iterator::{DoseIterator, DoseSample};
pub use statistics::DoseStatistics;
