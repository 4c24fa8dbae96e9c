//! Integration tests for the generalized eigenvalue decomposition
//! Exercises residuals, sorting, normalization and spectrum invariances

use geneig_rs::qz::{generalized_eigen, generalized_eigenvalues, GeneralizedEigen};
use ndarray::{arr2, Array2};
use num_complex::Complex;

/// Checks A * v = lambda * B * v component-wise for every returned pair,
/// including both members of each conjugate pair.
fn check_eigenpairs(a: &Array2<f64>, b: &Array2<f64>, eig: &GeneralizedEigen, tol: f64) {
    let n = a.nrows();
    let amax = a.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let bmax = b.iter().fold(0.0_f64, |m, x| m.max(x.abs()));

    let mut j = 0;
    while j < n {
        let lambda = Complex::new(eig.values_re[j], eig.values_im[j]);
        let is_pair = eig.values_im[j] != 0.0;
        let v: Vec<Complex<f64>> = (0..n)
            .map(|i| {
                if is_pair {
                    Complex::new(eig.vectors[[i, j]], eig.vectors[[i, j + 1]])
                } else {
                    Complex::new(eig.vectors[[i, j]], 0.0)
                }
            })
            .collect();

        let scale = (amax + lambda.norm() * bmax) * n as f64;
        let mut members = vec![(lambda, v.clone())];
        if is_pair {
            members.push((lambda.conj(), v.iter().map(|c| c.conj()).collect()));
        }
        for (lam, vec) in members {
            for i in 0..n {
                let mut av = Complex::new(0.0, 0.0);
                let mut bv = Complex::new(0.0, 0.0);
                for k in 0..n {
                    av += a[[i, k]] * vec[k];
                    bv += b[[i, k]] * vec[k];
                }
                let r = av - lam * bv;
                assert!(
                    r.norm() <= tol * scale,
                    "residual {} for eigenvalue {} at component {}",
                    r.norm(),
                    lam,
                    i
                );
            }
        }

        j += if is_pair { 2 } else { 1 };
    }
}

fn pencil_3x3() -> (Array2<f64>, Array2<f64>) {
    let a = arr2(&[[1.0, 2.0, 3.0], [8.0, 1.0, 4.0], [3.0, 2.0, 3.0]]);
    let b = arr2(&[[5.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 5.0]]);
    (a, b)
}

#[test]
fn single_entry_pencil() {
    let a = arr2(&[[3.0]]);
    let b = arr2(&[[2.0]]);
    let eig = generalized_eigen(&a, &b).unwrap();
    assert!((eig.values_re[0] - 1.5).abs() < 1e-14);
    assert_eq!(eig.values_im[0], 0.0);
    assert_eq!(eig.vectors[[0, 0]], 1.0);
}

#[test]
fn diagonal_pencil_sorted_with_basis_vectors() {
    let a = arr2(&[[4.0, 0.0], [0.0, 9.0]]);
    let b = Array2::eye(2);
    let eig = generalized_eigen(&a, &b).unwrap();

    assert!((eig.values_re[0] - 9.0).abs() < 1e-12);
    assert!((eig.values_re[1] - 4.0).abs() < 1e-12);
    // eigenvector columns are the basis vectors in permuted order
    assert!((eig.vectors[[1, 0]].abs() - 1.0).abs() < 1e-12);
    assert!(eig.vectors[[0, 0]].abs() < 1e-12);
    assert!((eig.vectors[[0, 1]].abs() - 1.0).abs() < 1e-12);
    assert!(eig.vectors[[1, 1]].abs() < 1e-12);
}

#[test]
fn rotation_pencil_conjugate_pair() {
    let a = arr2(&[[0.0, -1.0], [1.0, 0.0]]);
    let b = Array2::eye(2);
    let eig = generalized_eigen(&a, &b).unwrap();

    assert!(eig.values_re[0].abs() < 1e-12);
    assert!(eig.values_re[1].abs() < 1e-12);
    assert!((eig.values_im[0] - 1.0).abs() < 1e-12);
    assert!((eig.values_im[1] + 1.0).abs() < 1e-12);
    check_eigenpairs(&a, &b, &eig, 1e-8);
}

#[test]
fn residuals_dense_3x3() {
    let (a, b) = pencil_3x3();
    let eig = generalized_eigen(&a, &b).unwrap();
    check_eigenpairs(&a, &b, &eig, 1e-8);
}

#[test]
fn residuals_4x4_with_complex_block() {
    let a = arr2(&[
        [0.0, -1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 0.0, 5.0, 1.0],
        [0.0, 0.0, 0.0, 3.0],
    ]);
    let b = Array2::eye(4);
    let eig = generalized_eigen(&a, &b).unwrap();

    assert!((eig.values_re[0] - 5.0).abs() < 1e-10);
    assert!((eig.values_re[1] - 3.0).abs() < 1e-10);
    assert!((eig.values_im[2] - 1.0).abs() < 1e-10);
    assert!((eig.values_im[3] + 1.0).abs() < 1e-10);
    check_eigenpairs(&a, &b, &eig, 1e-8);
}

#[test]
fn residuals_dense_4x4() {
    let a = arr2(&[
        [1.0, 2.0, 3.0, 4.0],
        [-2.0, 1.0, 0.0, 1.0],
        [0.0, 3.0, 2.0, -1.0],
        [1.0, 0.0, 1.0, 1.0],
    ]);
    let b = arr2(&[
        [6.0, 1.0, 0.0, 1.0],
        [1.0, 7.0, 1.0, 0.0],
        [0.0, 1.0, 8.0, 1.0],
        [1.0, 0.0, 1.0, 9.0],
    ]);
    let eig = generalized_eigen(&a, &b).unwrap();
    check_eigenpairs(&a, &b, &eig, 1e-8);
}

#[test]
fn determinant_vanishes_at_eigenvalues() {
    let (a, b) = pencil_3x3();
    let (re, im) = generalized_eigenvalues(&a, &b).unwrap();
    let amax = a.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let bmax = b.iter().fold(0.0_f64, |m, x| m.max(x.abs()));

    for j in 0..3 {
        let lambda = Complex::new(re[j], im[j]);
        // entries of A - lambda * B
        let m: Vec<Vec<Complex<f64>>> = (0..3)
            .map(|i| (0..3).map(|k| a[[i, k]] - lambda * b[[i, k]]).collect())
            .collect();
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        let scale = amax + lambda.norm() * bmax;
        assert!(
            det.norm() <= 1e-6 * scale.powi(3),
            "det residual {} for eigenvalue {}",
            det.norm(),
            lambda
        );
    }
}

#[test]
fn eigenvectors_are_normalized() {
    for (a, b) in [
        pencil_3x3(),
        (
            arr2(&[
                [0.0, -1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 5.0, 1.0],
                [0.0, 0.0, 0.0, 3.0],
            ]),
            Array2::eye(4),
        ),
    ] {
        let n = a.nrows();
        let eig = generalized_eigen(&a, &b).unwrap();
        let mut j = 0;
        while j < n {
            if eig.values_im[j] != 0.0 {
                // joint normalization of the conjugate pair columns
                let max_mod = (0..n)
                    .map(|i| eig.vectors[[i, j]].hypot(eig.vectors[[i, j + 1]]))
                    .fold(0.0_f64, f64::max);
                assert!((max_mod - 1.0).abs() < 1e-12, "pair modulus {}", max_mod);
                j += 2;
            } else {
                let max_abs = (0..n)
                    .map(|i| eig.vectors[[i, j]].abs())
                    .fold(0.0_f64, f64::max);
                assert!((max_abs - 1.0).abs() < 1e-12, "column max {}", max_abs);
                j += 1;
            }
        }
    }
}

#[test]
fn spectrum_is_permutation_invariant() {
    let (a, b) = pencil_3x3();
    // cyclic permutation applied consistently to rows and columns of both
    let p = [2usize, 0, 1];
    let mut ap = Array2::zeros((3, 3));
    let mut bp = Array2::zeros((3, 3));
    for i in 0..3 {
        for j in 0..3 {
            ap[[i, j]] = a[[p[i], p[j]]];
            bp[[i, j]] = b[[p[i], p[j]]];
        }
    }

    let (re1, im1) = generalized_eigenvalues(&a, &b).unwrap();
    let (re2, im2) = generalized_eigenvalues(&ap, &bp).unwrap();

    let mut s1: Vec<(f64, f64)> = re1.iter().zip(im1.iter()).map(|(&r, &i)| (r, i)).collect();
    let mut s2: Vec<(f64, f64)> = re2.iter().zip(im2.iter()).map(|(&r, &i)| (r, i)).collect();
    let key = |x: &(f64, f64), y: &(f64, f64)| {
        x.0.total_cmp(&y.0).then_with(|| x.1.total_cmp(&y.1))
    };
    s1.sort_by(key);
    s2.sort_by(key);

    for (v1, v2) in s1.iter().zip(s2.iter()) {
        assert!(
            (v1.0 - v2.0).abs() < 1e-7 && (v1.1 - v2.1).abs() < 1e-7,
            "spectra differ: {:?} vs {:?}",
            v1,
            v2
        );
    }
}
