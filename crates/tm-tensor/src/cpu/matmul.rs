//! Host matmul kernels.
//!
//! `matmul_reference` is the textbook triple loop. `matmul_blocked` walks the
//! output in square blocks and stages the matching operand blocks into two
//! small scratch buffers before accumulating, the host analogue of the
//! accelerator's tiled kernel.

/// C[i, j] = sum_p A[i, p] * B[p, j], all row-major.
pub fn matmul_reference(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut c = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut sum = 0.0f32;
            for p in 0..k {
                sum += a[i * k + p] * b[p * n + j];
            }
            c[i * n + j] = sum;
        }
    }
    c
}

/// Cache-blocked matmul with `block x block` staging buffers.
///
/// Edge blocks are zero-padded, so `block` may exceed any of `m`, `k`, `n`.
/// `block` must be non-zero.
pub fn matmul_blocked(
    a: &[f32],
    b: &[f32],
    m: usize,
    k: usize,
    n: usize,
    block: usize,
) -> Vec<f32> {
    let t = block;
    let mut c = vec![0.0f32; m * n];
    let mut a_tile = vec![0.0f32; t * t];
    let mut b_tile = vec![0.0f32; t * t];
    let mut acc = vec![0.0f32; t * t];

    for bi in (0..m).step_by(t) {
        for bj in (0..n).step_by(t) {
            acc.iter_mut().for_each(|v| *v = 0.0);

            for k0 in (0..k).step_by(t) {
                // Stage operand blocks.
                for lx in 0..t {
                    for ly in 0..t {
                        let (row, col) = (bi + lx, k0 + ly);
                        a_tile[lx * t + ly] = if row < m && col < k {
                            a[row * k + col]
                        } else {
                            0.0
                        };
                        let (row, col) = (k0 + lx, bj + ly);
                        b_tile[lx * t + ly] = if row < k && col < n {
                            b[row * n + col]
                        } else {
                            0.0
                        };
                    }
                }

                for lx in 0..t {
                    for ly in 0..t {
                        let mut sum = acc[lx * t + ly];
                        for p in 0..t {
                            sum += a_tile[lx * t + p] * b_tile[p * t + ly];
                        }
                        acc[lx * t + ly] = sum;
                    }
                }
            }

            for lx in 0..t {
                for ly in 0..t {
                    let (row, col) = (bi + lx, bj + ly);
                    if row < m && col < n {
                        c[row * n + col] = acc[lx * t + ly];
                    }
                }
            }
        }
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_rectangular() {
        // [1,2,3] @ [4;5;6] = [32]
        let c = matmul_reference(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0], 1, 3, 1);
        assert_eq!(c, vec![32.0]);
    }

    #[test]
    fn test_blocked_matches_reference() {
        let (m, k, n) = (7, 5, 9);
        let a: Vec<f32> = (0..m * k).map(|i| (i % 11) as f32 - 5.0).collect();
        let b: Vec<f32> = (0..k * n).map(|i| (i % 7) as f32 * 0.5).collect();
        let expected = matmul_reference(&a, &b, m, k, n);
        for block in [1, 2, 3, 4, 8, 32] {
            let got = matmul_blocked(&a, &b, m, k, n, block);
            for (g, e) in got.iter().zip(expected.iter()) {
                approx::assert_relative_eq!(*g, *e, max_relative = 1e-4);
            }
        }
    }
}
