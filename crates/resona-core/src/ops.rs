//! Element-wise vector operations over sample slices.
//!
//! Four binary ops (add, sub, mul, div) in channel-to-channel and
//! channel-to-scalar forms, plus a sum-of-squares reduction for RMS. Each
//! op processes [`f32x4`] chunks with a scalar remainder loop. Lane
//! arithmetic is IEEE-identical to the scalar loop, so results are
//! bit-exact for any frame count — including counts below one SIMD width.
//!
//! These are the only primitives the render path uses for buffer
//! arithmetic; they write nothing but the destination slice.

use wide::f32x4;

const LANES: usize = 4;

macro_rules! binary_assign {
    ($name:ident, $scalar_name:ident, $op:tt, $doc:literal) => {
        #[doc = $doc]
        ///
        /// # Panics
        ///
        /// Panics if the slices differ in length.
        pub fn $name(dst: &mut [f32], src: &[f32]) {
            assert_eq!(dst.len(), src.len(), "slice length mismatch");
            let chunks = dst.len() / LANES;
            for i in 0..chunks {
                let at = i * LANES;
                let d = f32x4::new([dst[at], dst[at + 1], dst[at + 2], dst[at + 3]]);
                let s = f32x4::new([src[at], src[at + 1], src[at + 2], src[at + 3]]);
                dst[at..at + LANES].copy_from_slice(&(d $op s).to_array());
            }
            for i in chunks * LANES..dst.len() {
                dst[i] = dst[i] $op src[i];
            }
        }

        #[doc = $doc]
        #[doc = " Scalar operand form."]
        pub fn $scalar_name(dst: &mut [f32], value: f32) {
            let chunks = dst.len() / LANES;
            let v = f32x4::splat(value);
            for i in 0..chunks {
                let at = i * LANES;
                let d = f32x4::new([dst[at], dst[at + 1], dst[at + 2], dst[at + 3]]);
                dst[at..at + LANES].copy_from_slice(&(d $op v).to_array());
            }
            for i in chunks * LANES..dst.len() {
                dst[i] = dst[i] $op value;
            }
        }
    };
}

binary_assign!(add_assign, add_scalar, +, "Adds `src` into `dst` element-wise.");
binary_assign!(sub_assign, sub_scalar, -, "Subtracts `src` from `dst` element-wise.");
binary_assign!(mul_assign, mul_scalar, *, "Multiplies `dst` by `src` element-wise.");
binary_assign!(div_assign, div_scalar, /, "Divides `dst` by `src` element-wise.");

/// Sum of squared samples, for RMS metering.
///
/// Accumulates four partial sums lane-wise and reduces at the end; the
/// remainder is folded in scalar.
pub fn sum_of_squares(samples: &[f32]) -> f32 {
    let chunks = samples.len() / LANES;
    let mut acc = f32x4::splat(0.0);
    for i in 0..chunks {
        let at = i * LANES;
        let s = f32x4::new([samples[at], samples[at + 1], samples[at + 2], samples[at + 3]]);
        acc += s * s;
    }
    let lanes = acc.to_array();
    let mut total = (lanes[0] + lanes[1]) + (lanes[2] + lanes[3]);
    for &s in &samples[chunks * LANES..] {
        total += s * s;
    }
    total
}

/// Root-mean-square level of a slice. Returns 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    libm::sqrtf(sum_of_squares(samples) / samples.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, scale: f32) -> Vec<f32> {
        (0..len).map(|i| (i as f32 + 1.0) * scale).collect()
    }

    #[test]
    fn add_matches_scalar_for_non_simd_multiple() {
        // Length 33: eight full lanes plus a one-sample remainder.
        let a = ramp(33, 0.25);
        let b = ramp(33, -0.5);
        let mut simd = a.clone();
        add_assign(&mut simd, &b);
        for i in 0..33 {
            assert_eq!(simd[i], a[i] + b[i], "sample {i}");
        }
    }

    #[test]
    fn all_binary_ops_bit_exact() {
        for len in [0usize, 1, 3, 4, 5, 7, 8, 31, 64, 100] {
            let a = ramp(len, 0.37);
            let b = ramp(len, 1.13);
            let cases: [(fn(&mut [f32], &[f32]), fn(f32, f32) -> f32); 4] = [
                (add_assign, |x, y| x + y),
                (sub_assign, |x, y| x - y),
                (mul_assign, |x, y| x * y),
                (div_assign, |x, y| x / y),
            ];
            for (vector_op, scalar_op) in cases {
                let mut out = a.clone();
                vector_op(&mut out, &b);
                for i in 0..len {
                    assert_eq!(out[i].to_bits(), scalar_op(a[i], b[i]).to_bits());
                }
            }
        }
    }

    #[test]
    fn scalar_forms_bit_exact() {
        let a = ramp(29, 0.7);
        let mut out = a.clone();
        mul_scalar(&mut out, 0.5);
        for i in 0..29 {
            assert_eq!(out[i].to_bits(), (a[i] * 0.5).to_bits());
        }
        let mut out = a.clone();
        add_scalar(&mut out, -1.25);
        for i in 0..29 {
            assert_eq!(out[i].to_bits(), (a[i] - 1.25).to_bits());
        }
    }

    #[test]
    fn sum_of_squares_matches_reference() {
        let samples = ramp(37, 0.01);
        let reference: f32 = {
            // Same lane-partitioned order as the implementation.
            let mut lanes = [0.0f32; 4];
            let chunks = samples.len() / 4;
            for i in 0..chunks {
                for l in 0..4 {
                    let s = samples[i * 4 + l];
                    lanes[l] += s * s;
                }
            }
            let mut t = (lanes[0] + lanes[1]) + (lanes[2] + lanes[3]);
            for &s in &samples[chunks * 4..] {
                t += s * s;
            }
            t
        };
        let naive: f32 = samples.iter().map(|s| s * s).sum();
        let got = sum_of_squares(&samples);
        assert!((got - naive).abs() <= naive * 1e-5);
        // Exact against the lane-ordered reference.
        assert!((got - reference).abs() <= reference * 1e-6);
    }

    #[test]
    fn empty_slices_are_noops() {
        let mut empty: [f32; 0] = [];
        add_assign(&mut empty, &[]);
        assert_eq!(sum_of_squares(&[]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal() {
        let samples = [0.5f32; 48];
        assert!((rms(&samples) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }
}
