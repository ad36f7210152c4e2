/// Units which are simply type aliases for `f64` rather than having an
/// implementation as a `uom` `Quantity`.
///
/// These are the types that flow through the accessor graph voxel by voxel:
/// wrapping every lookup in a `Quantity` buys nothing there, but we still want
/// some clues in the source as to what the numbers represent.

pub type Lengthf64   = f64; // mm
pub type Dosef64     = f64; // Gy
pub type Volumef64   = f64; // mm^3
pub type Fractionf64 = f64; // [0, 1]
