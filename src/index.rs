/// Linear voxel id: x varies fastest, then y, then z
pub type Index1 = usize;
pub type VoxelGridId = Index1;
pub type Index3 = [usize; 3];
pub type BoxDim = [usize; 3];

// --------------------------------------------------------------------------------
//                  Conversion between 1d and 3d indices

use std::ops::{Add, Div, Mul, Rem};

pub fn index3_to_1<T>([ix, iy, iz]: [T; 3], [nx, ny, _nz]: [T; 3]) -> T
where
    T: Mul<Output = T> + Add<Output = T>
{
    ix + (iy + iz * ny) * nx
}

#[allow(clippy::many_single_char_names)]
pub fn index1_to_3<T>(i: T, [nx, ny, _nz]: [T; 3]) -> [T; 3]
where
    T: Mul<Output = T> +
    Div<Output = T> +
    Rem<Output = T> +
    Copy
{
    let z = i / (nx * ny);
    let r = i % (nx * ny);
    let y = r / nx;
    let x = r % nx;
    [x,y,z]
}

/// Is `index` inside a box of size `n`?
pub fn index3_in_box([ix, iy, iz]: Index3, [nx, ny, nz]: BoxDim) -> bool {
    ix < nx && iy < ny && iz < nz
}

/// Signed variant of `index3_in_box`: neighbourhood searches step off the
/// low edge of the grid as well as the high one.
pub fn signed_index3_in_box([ix, iy, iz]: [isize; 3], [nx, ny, nz]: BoxDim) -> bool {
    let inside = |i: isize, n: usize| i >= 0 && (i as usize) < n;
    inside(ix, nx) && inside(iy, ny) && inside(iz, nz)
}

pub fn n_voxels([nx, ny, nz]: BoxDim) -> usize { nx * ny * nz }
