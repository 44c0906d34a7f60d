//!
//! Strided 3-D tensor copy and rearrangement of network outputs
//!
//! The network emits a matrix with one row per frame, where the frames of
//! `num_sequences` sequences are stacked one sequence after another:
//!
//! ```text
//! row (s * T + t), col d   = output d of sequence s at time t
//! ```
//!
//! The recursions want the sequence index to vary fastest inside one frame,
//! so the outputs are rearranged into a time-major matrix:
//!
//! ```text
//! row t, col (d * S + s)   = output d of sequence s at time t
//! ```
//!
use crate::backend::Executor;
use ndarray::{Array2, ArrayView2};
use std::ops::Range;

/// Extent of a 3-D tensor along `(x, y, z)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dims3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

/// Element strides of a 3-D tensor along `(x, y, z)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strides3 {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Dims3 {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Dims3 { x, y, z }
    }
    pub fn n_elements(&self) -> usize {
        self.x * self.y * self.z
    }
    fn as_array(&self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }
}

impl Strides3 {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Strides3 { x, y, z }
    }
    /// offset of the element `(x, y, z)`
    #[inline]
    pub fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        x * self.x + y * self.y + z * self.z
    }
    /// offset of the last element of a non-empty tensor
    fn max_offset(&self, dims: Dims3) -> usize {
        self.offset(dims.x - 1, dims.y - 1, dims.z - 1)
    }
    fn as_array(&self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }
    ///
    /// Find an axis along which the tensor can be cut into disjoint
    /// contiguous chunks, i.e. whose stride is larger than the span of the
    /// other two axes. Prefers the longest such axis.
    ///
    fn outer_axis(&self, dims: Dims3) -> Option<usize> {
        let d = dims.as_array();
        let st = self.as_array();
        (0..3)
            .filter(|&a| {
                let span: usize = (0..3)
                    .filter(|&b| b != a)
                    .map(|b| (d[b] - 1) * st[b])
                    .sum();
                st[a] > span
            })
            .max_by_key(|&a| d[a])
    }
}

///
/// Copy every element `(x, y, z)` of `src` into `dst`, where both sides are
/// addressed by their own strides.
///
/// `src` and `dst` must not overlap and the strides of `dst` must not map two
/// elements onto one slot.
///
/// With a parallel executor the destination is split along an axis whose
/// chunks are disjoint (see `Strides3::outer_axis`); if no such axis exists
/// the copy runs as a plain loop.
///
pub fn tensor3d_copy<T, E>(
    executor: &E,
    dims: Dims3,
    src_strides: Strides3,
    dst_strides: Strides3,
    src: &[T],
    dst: &mut [T],
) where
    T: Copy + Send + Sync,
    E: Executor,
{
    if dims.n_elements() == 0 {
        return;
    }
    assert!(src.len() > src_strides.max_offset(dims));
    assert!(dst.len() > dst_strides.max_offset(dims));

    if executor.is_parallel() {
        if let Some(axis) = dst_strides.outer_axis(dims) {
            let d = dims.as_array();
            let ss = src_strides.as_array();
            let ds = dst_strides.as_array();
            // the two remaining axes, copied inside each chunk
            let (a, b) = match axis {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            executor.for_each_chunk(dst, ds[axis], d[axis], |i, chunk| {
                let src_base = i * ss[axis];
                for ia in 0..d[a] {
                    for ib in 0..d[b] {
                        chunk[ia * ds[a] + ib * ds[b]] = src[src_base + ia * ss[a] + ib * ss[b]];
                    }
                }
            });
            return;
        }
    }

    for x in 0..dims.x {
        for y in 0..dims.y {
            for z in 0..dims.z {
                dst[dst_strides.offset(x, y, z)] = src[src_strides.offset(x, y, z)];
            }
        }
    }
}

///
/// Rearrange the columns `cols` of a sequence-major network output into the
/// time-major layout.
///
/// * `nnet_output`: `(num_sequences * num_time_steps, _)`
/// * returns: `(num_time_steps, cols.len() * num_sequences)`
///
/// Panics if `num_time_steps` does not divide the number of rows.
///
pub fn rearrange_nnet_output<A, E>(
    executor: &E,
    nnet_output: ArrayView2<A>,
    cols: Range<usize>,
    num_time_steps: usize,
) -> Array2<A>
where
    A: Copy + Default + Send + Sync,
    E: Executor,
{
    assert!(num_time_steps > 0);
    assert!(cols.start <= cols.end && cols.end <= nnet_output.ncols());
    assert_eq!(nnet_output.nrows() % num_time_steps, 0);
    let num_sequences = nnet_output.nrows() / num_time_steps;
    let dim = cols.len();
    let stride = nnet_output.ncols();

    let src = nnet_output.as_standard_layout();
    let src_data = src.as_slice().expect("standard layout array is contiguous");
    let mut dst_data = vec![A::default(); num_time_steps * dim * num_sequences];
    if dim > 0 && num_sequences > 0 {
        tensor3d_copy(
            executor,
            Dims3::new(num_time_steps, dim, num_sequences),
            Strides3::new(stride, 1, stride * num_time_steps),
            Strides3::new(dim * num_sequences, num_sequences, 1),
            &src_data[cols.start..],
            &mut dst_data,
        );
    }
    Array2::from_shape_vec((num_time_steps, dim * num_sequences), dst_data)
        .expect("rearranged buffer has num_time_steps * dim * num_sequences elements")
}

///
/// Inverse of `rearrange_nnet_output`: write a time-major matrix back into
/// the columns `cols` of a sequence-major matrix. Other columns of
/// `nnet_output` are left untouched.
///
/// * `rearranged`: `(num_time_steps, cols.len() * num_sequences)`
/// * `nnet_output`: `(num_sequences * num_time_steps, _)`, in standard layout
///
pub fn rearrange_nnet_output_reverse<A, E>(
    executor: &E,
    rearranged: ArrayView2<A>,
    nnet_output: &mut Array2<A>,
    cols: Range<usize>,
) where
    A: Copy + Send + Sync,
    E: Executor,
{
    let num_time_steps = rearranged.nrows();
    assert!(num_time_steps > 0);
    assert!(cols.start <= cols.end && cols.end <= nnet_output.ncols());
    assert_eq!(nnet_output.nrows() % num_time_steps, 0);
    let num_sequences = nnet_output.nrows() / num_time_steps;
    let dim = cols.len();
    assert_eq!(rearranged.ncols(), dim * num_sequences);
    if dim == 0 || num_sequences == 0 {
        return;
    }
    let stride = nnet_output.ncols();

    let src = rearranged.as_standard_layout();
    let src_data = src.as_slice().expect("standard layout array is contiguous");
    let dst_data = nnet_output
        .as_slice_mut()
        .expect("nnet_output should be in standard layout");
    tensor3d_copy(
        executor,
        Dims3::new(num_time_steps, dim, num_sequences),
        Strides3::new(dim * num_sequences, num_sequences, 1),
        Strides3::new(stride, 1, stride * num_time_steps),
        src_data,
        &mut dst_data[cols.start..],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Parallel, Sequential};
    use ndarray::{array, Array2};
    use test_case::test_case;

    fn iota(rows: usize, cols: usize) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(i, j)| (i * cols + j) as f32)
    }

    #[test]
    fn tensor3d_copy_transpose() {
        // 2x3 matrix transposed into 3x2, z axis is trivial
        let src: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
        let mut dst = vec![0u8; 6];
        tensor3d_copy(
            &Sequential,
            Dims3::new(2, 3, 1),
            Strides3::new(3, 1, 0),
            Strides3::new(1, 2, 0),
            &src,
            &mut dst,
        );
        assert_eq!(dst, vec![1, 4, 2, 5, 3, 6]);
    }
    #[test]
    fn tensor3d_copy_parallel_matches_sequential() {
        let dims = Dims3::new(5, 4, 3);
        let src: Vec<f64> = (0..dims.n_elements()).map(|i| i as f64 * 0.5).collect();
        for dst_strides in vec![
            Strides3::new(12, 3, 1),
            Strides3::new(1, 5, 20),
            Strides3::new(4, 1, 20),
            // padded rows
            Strides3::new(16, 4, 1),
        ] {
            let len = dst_strides.max_offset(dims) + 1;
            let mut d1 = vec![-1.0; len];
            let mut d2 = vec![-1.0; len];
            let src_strides = Strides3::new(12, 3, 1);
            tensor3d_copy(&Sequential, dims, src_strides, dst_strides, &src, &mut d1);
            tensor3d_copy(&Parallel, dims, src_strides, dst_strides, &src, &mut d2);
            assert_eq!(d1, d2);
        }
    }
    #[test]
    fn strides_outer_axis() {
        let dims = Dims3::new(5, 4, 3);
        assert_eq!(Strides3::new(12, 3, 1).outer_axis(dims), Some(0));
        assert_eq!(Strides3::new(1, 5, 20).outer_axis(dims), Some(2));
        // interleaved: no axis gives disjoint chunks
        assert_eq!(Strides3::new(3, 10, 1).outer_axis(dims), None);
    }
    #[test]
    fn rearrange_small_batch() {
        // 2 sequences of 2 frames, dim 2
        // seq0: t0 [0 1], t1 [2 3]; seq1: t0 [4 5], t1 [6 7]
        let x = iota(4, 2);
        let r = rearrange_nnet_output(&Sequential, x.view(), 0..2, 2);
        // row t, col (d * S + s)
        assert_eq!(r, array![[0.0f32, 4.0, 1.0, 5.0], [2.0, 6.0, 3.0, 7.0]]);
    }
    #[test]
    fn rearrange_column_range() {
        let x = iota(6, 4);
        // 3 sequences of 2 frames, columns 1..3 only
        let r = rearrange_nnet_output(&Sequential, x.view(), 1..3, 2);
        assert_eq!(r.dim(), (2, 6));
        for t in 0..2 {
            for d in 0..2 {
                for s in 0..3 {
                    assert_eq!(r[[t, d * 3 + s]], x[[s * 2 + t, d + 1]]);
                }
            }
        }
    }
    #[test_case(Backend::Sequential, 1, 1 ; "single")]
    #[test_case(Backend::Sequential, 7, 3 ; "sequential batch")]
    #[test_case(Backend::Parallel, 7, 3 ; "parallel batch")]
    #[test_case(Backend::Parallel, 1, 5 ; "parallel one frame")]
    fn rearrange_roundtrip(backend: Backend, num_time_steps: usize, num_sequences: usize) {
        let x = iota(num_time_steps * num_sequences, 5);
        let r = rearrange_nnet_output(&backend, x.view(), 0..5, num_time_steps);
        let mut y = Array2::zeros(x.dim());
        rearrange_nnet_output_reverse(&backend, r.view(), &mut y, 0..5);
        assert_eq!(x, y);
    }
    #[test]
    fn rearrange_reverse_leaves_other_columns() {
        let x = iota(4, 3);
        let r = rearrange_nnet_output(&Parallel, x.view(), 0..2, 2);
        let mut y = Array2::from_elem((4, 3), 9.0);
        rearrange_nnet_output_reverse(&Parallel, r.view(), &mut y, 0..2);
        for i in 0..4 {
            assert_eq!(y[[i, 0]], x[[i, 0]]);
            assert_eq!(y[[i, 1]], x[[i, 1]]);
            assert_eq!(y[[i, 2]], 9.0);
        }
    }
    #[test]
    #[should_panic]
    fn rearrange_not_divisible() {
        let x = iota(5, 2);
        rearrange_nnet_output(&Sequential, x.view(), 0..2, 2);
    }
    #[test]
    #[should_panic]
    fn rearrange_reverse_wrong_width() {
        let r = iota(2, 5);
        let mut y: Array2<f32> = Array2::zeros((4, 2));
        rearrange_nnet_output_reverse(&Sequential, r.view(), &mut y, 0..2);
    }
}
