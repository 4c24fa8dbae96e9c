//! Generalized Eigenvalue Decomposition (QZ algorithm)
//!
//! This module solves the real generalized eigenproblem: given square
//! matrices A and B of order n, find scalars lambda and vectors v != 0 with
//!
//! ```text
//!     A * v = lambda * B * v,    equivalently    det(A - lambda * B) = 0
//! ```
//!
//! The computation is the classical four-stage QZ pipeline of Moler and
//! Stewart, in the EISPACK formulation:
//!
//! 1. [`hessenberg_triangular`] reduces B to upper triangular form and A to
//!    upper Hessenberg form with orthogonal transformations.
//! 2. [`qz_iterate`] reduces the Hessenberg A to quasi-triangular form by
//!    implicit-shift sweeps while keeping B triangular.
//! 3. [`qz_eigenvalues`] walks the quasi-triangular pencil and emits the
//!    eigenvalue triples (alfr, alfi, beta) with beta >= 0.
//! 4. [`qz_eigenvectors`] back-substitutes for the eigenvectors and
//!    transforms them to the original coordinate system.
//!
//! The driver [`generalized_eigen`] runs all four stages on working copies,
//! sorts the eigenpairs by descending magnitude and returns a
//! [`GeneralizedEigen`] result. [`generalized_eigenvalues`] is the
//! eigenvalues-only variant that skips transform accumulation entirely.
//!
//! B does not need to be positive definite, but it should be nonsingular for
//! a well-posed problem; a singular B produces infinite eigenvalues reported
//! through `beta` values near zero.

use ndarray::{Array1, Array2};
use num_complex::Complex;

/// Unit roundoff for f64, the default perturbation level of the QZ sweeps.
const UNIT_ROUNDOFF: f64 = f64::EPSILON / 2.0;

/// Error type for the generalized eigenvalue drivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EigenError {
    /// The pencil has order zero
    EmptyPencil,
    /// A or B is not square
    NotSquare { rows: usize, cols: usize },
    /// A and B have different orders
    ShapeMismatch { a_order: usize, b_order: usize },
    /// The iteration budget of 30*n sweeps was exhausted before the pencil
    /// became quasi-triangular. `index` is the 1-based index of the last
    /// eigenvalue block that failed to converge; eigenvalues with larger
    /// indices did converge.
    NonConvergence { index: usize },
}

impl std::fmt::Display for EigenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EigenError::EmptyPencil => write!(f, "matrix pencil has order zero"),
            EigenError::NotSquare { rows, cols } => {
                write!(f, "matrix is not square: {} x {}", rows, cols)
            }
            EigenError::ShapeMismatch { a_order, b_order } => {
                write!(
                    f,
                    "pencil matrices have different orders: A is {0} x {0}, B is {1} x {1}",
                    a_order, b_order
                )
            }
            EigenError::NonConvergence { index } => {
                write!(
                    f,
                    "eigenvalue block {} failed to converge within the iteration budget",
                    index
                )
            }
        }
    }
}

impl std::error::Error for EigenError {}

/// Scale thresholds and convergence report shared by the QZ stages.
///
/// Produced by [`qz_iterate`] and consumed by [`qz_eigenvalues`] and
/// [`qz_eigenvectors`]. `epsa` and `epsb` are row-norm based tolerances that
/// decide when an entry of A or B counts as negligible.
#[derive(Debug, Clone, Copy)]
pub struct QzContext {
    /// Negligibility threshold for entries of A
    pub epsa: f64,
    /// Negligibility threshold for entries of B
    pub epsb: f64,
    /// `Some(i)` if the block ending at 1-based index `i` did not converge
    /// within 30*n sweeps; eigenvalues `i+1..=n` are reliable, `1..=i` are not.
    pub unconverged: Option<usize>,
}

/// Result of a full generalized eigenvalue decomposition.
///
/// Eigenpairs are sorted by descending magnitude of the real part, with
/// ties broken by descending magnitude of the imaginary part. Complex
/// conjugate pairs occupy adjacent indices `j`, `j + 1` with
/// `values_im[j] > 0 > values_im[j + 1]`; for such a pair the eigenvector of
/// the first member is `vectors.column(j) + i * vectors.column(j + 1)` and
/// the second member takes its conjugate.
#[derive(Debug, Clone)]
pub struct GeneralizedEigen {
    /// Real parts of the eigenvalues
    pub values_re: Array1<f64>,
    /// Imaginary parts of the eigenvalues
    pub values_im: Array1<f64>,
    /// Eigenvectors as columns, `values_re[j]` pairing with column `j`.
    /// Real columns are scaled so the largest component magnitude is 1;
    /// conjugate-pair column pairs are scaled jointly so the largest
    /// per-row complex modulus is 1.
    pub vectors: Array2<f64>,
}

impl GeneralizedEigen {
    /// Order of the decomposed pencil.
    #[inline]
    pub fn order(&self) -> usize {
        self.values_re.len()
    }

    /// Eigenvalues assembled as complex numbers.
    ///
    /// ```
    /// use ndarray::arr2;
    /// use geneig_rs::qz::generalized_eigen;
    ///
    /// let a = arr2(&[[0.0, -1.0], [1.0, 0.0]]);
    /// let b = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
    /// let eig = generalized_eigen(&a, &b).unwrap();
    /// let values = eig.values();
    /// assert!((values[0].im - 1.0).abs() < 1e-12);
    /// assert!((values[1].im + 1.0).abs() < 1e-12);
    /// ```
    pub fn values(&self) -> Array1<Complex<f64>> {
        self.values_re
            .iter()
            .zip(self.values_im.iter())
            .map(|(&re, &im)| Complex::new(re, im))
            .collect()
    }
}

/// Transfer of sign: |a| with the sign of b.
#[inline]
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// Complex division (tr + i*ti) / (dr + i*di) without intermediate overflow.
#[inline]
fn cdiv(tr: f64, ti: f64, dr: f64, di: f64) -> (f64, f64) {
    if di.abs() <= dr.abs() {
        let rr = di / dr;
        let d = dr + di * rr;
        ((tr + ti * rr) / d, (ti - tr * rr) / d)
    } else {
        let rr = dr / di;
        let d = dr * rr + di;
        ((tr * rr + ti) / d, (ti * rr - tr) / d)
    }
}

/// 2-element Householder-style eliminator built from the pair (p, q).
///
/// Applying it to a pair of values (x, y) sends (p, q) to (r, 0) while
/// preserving orthogonality of the overall transformation.
struct Rot2 {
    u2: f64,
    v1: f64,
    v2: f64,
}

impl Rot2 {
    /// None when p and q are both zero (nothing to eliminate).
    fn new(p: f64, q: f64) -> Option<Rot2> {
        let s = p.abs() + q.abs();
        if s == 0.0 {
            return None;
        }
        let u1 = p / s;
        let u2 = q / s;
        let r = sign((u1 * u1 + u2 * u2).sqrt(), u1);
        let v1 = -(u1 + r) / r;
        let v2 = -u2 / r;
        Some(Rot2 { u2: v2 / v1, v1, v2 })
    }

    /// Apply from the left to rows (r1, r2) over the column range.
    fn rows(&self, m: &mut Array2<f64>, r1: usize, r2: usize, cols: std::ops::Range<usize>) {
        for j in cols {
            let t = m[[r1, j]] + self.u2 * m[[r2, j]];
            m[[r1, j]] += t * self.v1;
            m[[r2, j]] += t * self.v2;
        }
    }

    /// Apply from the right to columns (c1, c2) over the row range.
    fn cols(&self, m: &mut Array2<f64>, c1: usize, c2: usize, rows: std::ops::Range<usize>) {
        for i in rows {
            let t = m[[i, c1]] + self.u2 * m[[i, c2]];
            m[[i, c1]] += t * self.v1;
            m[[i, c2]] += t * self.v2;
        }
    }
}

/// 3-element companion of [`Rot2`] for the double-shift sweeps.
struct Rot3 {
    u2: f64,
    u3: f64,
    v1: f64,
    v2: f64,
    v3: f64,
}

impl Rot3 {
    fn new(p: f64, q: f64, r: f64) -> Option<Rot3> {
        let s = p.abs() + q.abs() + r.abs();
        if s == 0.0 {
            return None;
        }
        let u1 = p / s;
        let u2 = q / s;
        let u3 = r / s;
        let rr = sign((u1 * u1 + u2 * u2 + u3 * u3).sqrt(), u1);
        let v1 = -(u1 + rr) / rr;
        let v2 = -u2 / rr;
        let v3 = -u3 / rr;
        Some(Rot3 {
            u2: v2 / v1,
            u3: v3 / v1,
            v1,
            v2,
            v3,
        })
    }

    fn rows(
        &self,
        m: &mut Array2<f64>,
        r1: usize,
        r2: usize,
        r3: usize,
        cols: std::ops::Range<usize>,
    ) {
        for j in cols {
            let t = m[[r1, j]] + self.u2 * m[[r2, j]] + self.u3 * m[[r3, j]];
            m[[r1, j]] += t * self.v1;
            m[[r2, j]] += t * self.v2;
            m[[r3, j]] += t * self.v3;
        }
    }

    fn cols(
        &self,
        m: &mut Array2<f64>,
        c1: usize,
        c2: usize,
        c3: usize,
        rows: std::ops::Range<usize>,
    ) {
        for i in rows {
            let t = m[[i, c1]] + self.u2 * m[[i, c2]] + self.u3 * m[[i, c3]];
            m[[i, c1]] += t * self.v1;
            m[[i, c2]] += t * self.v2;
            m[[i, c3]] += t * self.v3;
        }
    }
}

/// Reduces the pencil (A, B) to Hessenberg/triangular form.
///
/// B is brought to upper triangular form with column-wise Householder
/// reflections, then A is brought to upper Hessenberg form column by column
/// with plane rotations, each followed by a rotation from the right that
/// restores the triangularity of B. When `z` is given it is initialized to
/// the identity and accumulates every right transformation, which is what
/// the eigenvector stage later needs to map results back to the original
/// coordinate system.
///
/// # Arguments
///
/// * `a` - Input/output: N x N matrix, on return upper Hessenberg
/// * `b` - Input/output: N x N matrix, on return upper triangular
/// * `z` - Accumulator for the right transformation, or `None` when
///   eigenvectors are not wanted
///
/// Columns whose relevant entries are already zero are skipped. For n <= 1
/// the reduction is a no-op; for n = 2 only the triangularization of B runs.
///
/// # Examples
///
/// ```
/// use ndarray::{arr2, Array2};
/// use geneig_rs::qz::hessenberg_triangular;
///
/// let mut a = arr2(&[[1.0, 2.0, 3.0], [8.0, 1.0, 4.0], [3.0, 2.0, 3.0]]);
/// let mut b = arr2(&[[5.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 5.0]]);
/// let mut z = Array2::zeros((3, 3));
/// hessenberg_triangular(&mut a, &mut b, Some(&mut z));
///
/// // B is upper triangular, A is upper Hessenberg
/// assert_eq!(b[[1, 0]], 0.0);
/// assert_eq!(b[[2, 0]], 0.0);
/// assert_eq!(b[[2, 1]], 0.0);
/// assert_eq!(a[[2, 0]], 0.0);
/// ```
pub fn hessenberg_triangular(
    a: &mut Array2<f64>,
    b: &mut Array2<f64>,
    mut z: Option<&mut Array2<f64>>,
) {
    let n = a.nrows();

    if let Some(z) = z.as_deref_mut() {
        z.fill(0.0);
        for j in 0..n {
            z[[j, j]] = 1.0;
        }
    }

    if n <= 1 {
        return;
    }

    // Reduce B to upper triangular form
    for l in 0..n - 1 {
        let l1 = l + 1;
        let mut s: f64 = (l1..n).map(|i| b[[i, l]].abs()).sum();
        if s == 0.0 {
            continue;
        }
        s += b[[l, l]].abs();

        let mut r = 0.0;
        for i in l..n {
            b[[i, l]] /= s;
            r += b[[i, l]] * b[[i, l]];
        }
        r = sign(r.sqrt(), b[[l, l]]);
        b[[l, l]] += r;
        let rho = r * b[[l, l]];

        for j in l1..n {
            let mut t = 0.0;
            for i in l..n {
                t += b[[i, l]] * b[[i, j]];
            }
            t = -t / rho;
            for i in l..n {
                b[[i, j]] += t * b[[i, l]];
            }
        }
        for j in 0..n {
            let mut t = 0.0;
            for i in l..n {
                t += b[[i, l]] * a[[i, j]];
            }
            t = -t / rho;
            for i in l..n {
                a[[i, j]] += t * b[[i, l]];
            }
        }

        b[[l, l]] = -s * r;
        for i in l1..n {
            b[[i, l]] = 0.0;
        }
    }

    // Reduce A to upper Hessenberg form while keeping B triangular
    if n == 2 {
        return;
    }
    for k in 0..n - 2 {
        for l in (k + 1..=n - 2).rev() {
            let l1 = l + 1;

            // Zero a(l+1, k)
            if let Some(rot) = Rot2::new(a[[l, k]], a[[l1, k]]) {
                rot.rows(a, l, l1, k..n);
                a[[l1, k]] = 0.0;
                rot.rows(b, l, l1, l..n);
            } else {
                continue;
            }

            // Zero b(l+1, l)
            if let Some(rot) = Rot2::new(b[[l1, l1]], b[[l1, l]]) {
                rot.cols(b, l1, l, 0..l1 + 1);
                b[[l1, l]] = 0.0;
                rot.cols(a, l1, l, 0..n);
                if let Some(z) = z.as_deref_mut() {
                    rot.cols(z, l1, l, 0..n);
                }
            }
        }
    }
}

/// Steps of the implicit-shift sweep, one per jump target of the classical
/// formulation.
enum Step {
    /// Open the next outer window ending at `en`
    Window,
    /// Scan the window for a negligible sub-diagonal entry
    Scan,
    /// Zero a converged sub-diagonal entry and shrink or continue
    Deflate,
    /// Fix the window top before the pivot check
    PivotTop,
    /// Check for a negligible diagonal pivot of B and push it out
    PivotCheck,
    /// Select the shift for this sweep
    Strategy,
    /// Chase the bulge through the active window
    Chase,
}

/// Reduces a Hessenberg/triangular pencil to quasi-triangular form.
///
/// Repeatedly applies implicit-shift orthogonal transformations to the
/// active sub-pencil, deflating converged 1 x 1 and 2 x 2 blocks from the
/// bottom, until A is block upper triangular and B is still upper
/// triangular. Each sweep either takes a single real shift from the trailing
/// 2 x 2 block, a Francis-style double shift when that block has complex
/// roots, or a fixed ad hoc shift after ten stalled sweeps on one window.
///
/// The total number of sweeps is capped at 30*n. If the budget runs out the
/// remaining window is left unreduced and the returned context records the
/// 1-based index of the block that failed; the extraction stages still run
/// on such a pencil and produce best-effort results.
///
/// # Arguments
///
/// * `a` - Input/output: upper Hessenberg, on return quasi-triangular
/// * `b` - Input/output: upper triangular, kept upper triangular
/// * `z` - Right-transform accumulator carried over from the reduction, or
///   `None`. When `None`, only the rows and columns needed for eigenvalues
///   are updated.
/// * `eps1` - Perturbation level deciding negligibility; a value <= 0 selects
///   machine epsilon. The drivers pass unit roundoff.
///
/// # Returns
///
/// The [`QzContext`] holding `epsa`, `epsb` and the convergence report for
/// the following stages.
pub fn qz_iterate(
    a: &mut Array2<f64>,
    b: &mut Array2<f64>,
    mut z: Option<&mut Array2<f64>>,
    eps1: f64,
) -> QzContext {
    let n = a.nrows();

    // Row-norm based thresholds shared by all later negligibility tests
    let mut anorm = 0.0_f64;
    let mut bnorm = 0.0_f64;
    for i in 0..n {
        let mut ani = if i > 0 { a[[i, i - 1]].abs() } else { 0.0 };
        let mut bni = 0.0;
        for j in i..n {
            ani += a[[i, j]].abs();
            bni += b[[i, j]].abs();
        }
        if ani > anorm {
            anorm = ani;
        }
        if bni > bnorm {
            bnorm = bni;
        }
    }
    if anorm == 0.0 {
        anorm = 1.0;
    }
    if bnorm == 0.0 {
        bnorm = 1.0;
    }
    let ep = if eps1 > 0.0 { eps1 } else { f64::EPSILON };
    let mut ctx = QzContext {
        epsa: ep * anorm,
        epsb: ep * bnorm,
        unconverged: None,
    };
    if n <= 2 {
        return ctx;
    }

    let matz = z.is_some();
    let mut en = n - 1;
    let mut itn = 30 * n;
    let mut enorn = n;
    let mut lor1 = 0usize;

    let mut its = 0usize;
    let mut na = 0usize;
    let mut enm2 = 0usize;
    let mut l = 0usize;
    let mut lm1 = 0usize;
    let mut ld = 0usize;
    let mut ish = 2usize;
    let mut sh = 0.0_f64;
    let mut a1 = 0.0_f64;
    let mut a2 = 0.0_f64;
    let mut a3 = 0.0_f64;

    let mut step = Step::Window;
    loop {
        match step {
            Step::Window => {
                if en <= 1 {
                    break;
                }
                if !matz {
                    enorn = en + 1;
                }
                its = 0;
                na = en - 1;
                enm2 = na;
                step = Step::Scan;
            }

            Step::Scan => {
                ish = 2;
                let mut found = None;
                for cand in (1..=en).rev() {
                    if a[[cand, cand - 1]].abs() <= ctx.epsa {
                        found = Some(cand);
                        break;
                    }
                }
                match found {
                    Some(cand) => {
                        l = cand;
                        lm1 = cand - 1;
                        step = Step::Deflate;
                    }
                    None => {
                        l = 0;
                        lm1 = 0;
                        step = Step::PivotTop;
                    }
                }
            }

            Step::Deflate => {
                a[[l, lm1]] = 0.0;
                if l < na {
                    step = Step::PivotTop;
                } else {
                    // 1 x 1 or 2 x 2 block isolated
                    en = lm1;
                    step = Step::Window;
                }
            }

            Step::PivotTop => {
                ld = l;
                step = Step::PivotCheck;
            }

            Step::PivotCheck => {
                let l1 = l + 1;
                if b[[l, l]].abs() > ctx.epsb {
                    step = Step::Strategy;
                } else {
                    // Negligible pivot of B: zero it and push the
                    // singularity toward the top of the window
                    b[[l, l]] = 0.0;
                    if let Some(rot) = Rot2::new(a[[l, l]], a[[l1, l]]) {
                        rot.rows(a, l, l1, l..enorn);
                        rot.rows(b, l, l1, l..enorn);
                    }
                    if l != 0 {
                        a[[l, lm1]] = -a[[l, lm1]];
                    }
                    lm1 = l;
                    l = l1;
                    step = Step::Deflate;
                }
            }

            Step::Strategy => {
                let l1 = l + 1;
                let b11 = b[[l, l]];
                let a11 = a[[l, l]] / b11;
                let a21 = a[[l1, l]] / b11;

                if ish == 1 {
                    // Shift already selected, form the first column
                    a1 = a11 - sh;
                    a2 = a21;
                    if l != ld {
                        a[[l, lm1]] = -a[[l, lm1]];
                    }
                    step = Step::Chase;
                    continue;
                }
                if itn == 0 {
                    ctx.unconverged = Some(en + 1);
                    break;
                }
                if its == 10 {
                    // Ad hoc shift to break stagnation
                    a1 = 0.0;
                    a2 = 1.0;
                    a3 = 1.1605;
                    step = Step::Chase;
                    continue;
                }

                // Shift candidates from the trailing 2 x 2 block
                let mut b22 = b[[l1, l1]];
                if b22.abs() < ctx.epsb {
                    b22 = ctx.epsb;
                }
                let mut b33 = b[[na, na]];
                if b33.abs() < ctx.epsb {
                    b33 = ctx.epsb;
                }
                let mut b44 = b[[en, en]];
                if b44.abs() < ctx.epsb {
                    b44 = ctx.epsb;
                }
                let a33 = a[[na, na]] / b33;
                let a34 = a[[na, en]] / b44;
                let a43 = a[[en, na]] / b33;
                let a44 = a[[en, en]] / b44;
                let b34 = b[[na, en]] / b44;
                let t = 0.5 * (a43 * b34 - a33 - a44);
                let r = t * t + a34 * a43 - a33 * a44;

                if r < 0.0 {
                    // Complex roots: Francis double shift, first column of
                    // the implicit quadratic
                    let a12 = a[[l, l1]] / b22;
                    let a22 = a[[l1, l1]] / b22;
                    let b12 = b[[l, l1]] / b22;
                    a1 = ((a33 - a11) * (a44 - a11) - a34 * a43 + a43 * b34 * a11) / a21 + a12
                        - a11 * b12;
                    a2 = a22 - a11 - a21 * b12 - (a33 - a11) - (a44 - a11) + a43 * b34;
                    a3 = a[[l1 + 1, l1]] / b22;
                    step = Step::Chase;
                } else {
                    // Real roots: single shift, the root closer to a44
                    ish = 1;
                    let rr = r.sqrt();
                    sh = -t + rr;
                    let s = -t - rr;
                    if (s - a44).abs() < (sh - a44).abs() {
                        sh = s;
                    }
                    // Look for two consecutive small sub-diagonal elements
                    let mut split = None;
                    for cand in (ld + 1..enm2).rev() {
                        let mut t = a[[cand + 1, cand + 1]];
                        if b[[cand, cand]].abs() > ctx.epsb {
                            t -= sh * b[[cand, cand]];
                        }
                        if a[[cand, cand - 1]].abs()
                            <= (t / a[[cand + 1, cand]]).abs() * ctx.epsa
                        {
                            split = Some(cand);
                            break;
                        }
                    }
                    match split {
                        Some(cand) => {
                            l = cand;
                            lm1 = cand - 1;
                            step = Step::PivotCheck;
                        }
                        None => {
                            a1 = a11 - sh;
                            a2 = a21;
                            if l != ld {
                                a[[l, lm1]] = -a[[l, lm1]];
                            }
                            step = Step::Chase;
                        }
                    }
                }
            }

            Step::Chase => {
                its += 1;
                itn -= 1;
                if !matz {
                    lor1 = ld;
                }

                for k in l..=na {
                    let notlas = k != na && ish == 2;
                    let k1 = k + 1;
                    let k2 = k + 2;
                    let km1 = k.max(l + 1) - 1;
                    let ll = en.min(k1 + ish);

                    if !notlas {
                        // Zero a(k+1, k-1) with a 2-element rotation
                        if k != l {
                            a1 = a[[k, km1]];
                            a2 = a[[k1, km1]];
                        }
                        match Rot2::new(a1, a2) {
                            Some(rot) => {
                                rot.rows(a, k, k1, km1..enorn);
                                rot.rows(b, k, k1, km1..enorn);
                                if k != l {
                                    a[[k1, km1]] = 0.0;
                                }
                            }
                            None => break, // nothing to chase, rescan
                        }
                    } else {
                        // Zero a(k+1, k-1) and a(k+2, k-1)
                        if k != l {
                            a1 = a[[k, km1]];
                            a2 = a[[k1, km1]];
                            a3 = a[[k2, km1]];
                        }
                        let rot = match Rot3::new(a1, a2, a3) {
                            Some(rot) => rot,
                            None => continue,
                        };
                        rot.rows(a, k, k1, k2, km1..enorn);
                        rot.rows(b, k, k1, k2, km1..enorn);
                        if k != l {
                            a[[k1, km1]] = 0.0;
                            a[[k2, km1]] = 0.0;
                        }

                        // Zero b(k+2, k+1) and b(k+2, k)
                        if let Some(rot) = Rot3::new(b[[k2, k2]], b[[k2, k1]], b[[k2, k]]) {
                            rot.cols(a, k2, k1, k, lor1..ll + 1);
                            rot.cols(b, k2, k1, k, lor1..ll + 1);
                            b[[k2, k]] = 0.0;
                            b[[k2, k1]] = 0.0;
                            if let Some(z) = z.as_deref_mut() {
                                rot.cols(z, k2, k1, k, 0..n);
                            }
                        }
                    }

                    // Zero b(k+1, k)
                    if let Some(rot) = Rot2::new(b[[k1, k1]], b[[k1, k]]) {
                        rot.cols(a, k1, k, lor1..ll + 1);
                        rot.cols(b, k1, k, lor1..ll + 1);
                        b[[k1, k]] = 0.0;
                        if let Some(z) = z.as_deref_mut() {
                            rot.cols(z, k1, k, 0..n);
                        }
                    }
                }

                step = Step::Scan;
            }
        }
    }

    ctx
}

/// Extracts the eigenvalue triples from a quasi-triangular pencil.
///
/// Walks the diagonal blocks from the bottom up. A 1 x 1 block yields one
/// real triple directly from the diagonal. A 2 x 2 block is first decoupled:
/// when the scalar quadratic formed from the normalized block has real
/// roots, two rotations diagonalize the block exactly and both triples are
/// read off the diagonal; when the roots are complex, the diagonalizing
/// complex rotation is formed virtually and the triples of the conjugate
/// pair are derived from the diagonal entries it would produce, without
/// mutating the pencil.
///
/// Every `beta[i]` is non-negative and the eigenvalue at index `i` is
/// `(alfr[i] + i * alfi[i]) / beta[i]`. Conjugate pairs sit at adjacent
/// indices with imaginary parts of opposite sign.
///
/// # Returns
///
/// The arrays `(alfr, alfi, beta)` of length n.
pub fn qz_eigenvalues(
    a: &mut Array2<f64>,
    b: &mut Array2<f64>,
    mut z: Option<&mut Array2<f64>>,
    ctx: &QzContext,
) -> (Array1<f64>, Array1<f64>, Array1<f64>) {
    let n = a.nrows();
    let epsb = ctx.epsb;
    let mut alfr = Array1::<f64>::zeros(n);
    let mut alfi = Array1::<f64>::zeros(n);
    let mut beta = Array1::<f64>::zeros(n);

    let mut pair_done = false;
    for nn in 0..n {
        let en = n - 1 - nn;
        if pair_done {
            pair_done = false;
            continue;
        }

        if en == 0 || a[[en, en - 1]] == 0.0 {
            // 1 x 1 block, one real root
            let mut ar = a[[en, en]];
            if b[[en, en]] < 0.0 {
                ar = -ar;
            }
            alfr[en] = ar;
            alfi[en] = 0.0;
            beta[en] = b[[en, en]].abs();
            continue;
        }

        let na = en - 1;
        if b[[na, na]].abs() <= epsb {
            // Degenerate top pivot: one rotation from the left decouples
            let a1 = a[[na, na]];
            let a2 = a[[en, na]];
            if let Some(rot) = Rot2::new(a1, a2) {
                rot.rows(a, na, en, na..n);
                rot.rows(b, na, en, na..n);
            }
            finish_real_pair(a, b, &mut alfr, &mut alfi, &mut beta, na, en);
        } else if b[[en, en]].abs() <= epsb {
            // Degenerate bottom pivot: one rotation from the right
            let a1 = a[[en, en]];
            let a2 = a[[en, na]];
            if let Some(rot) = Rot2::new(a1, a2) {
                rot.cols(a, en, na, 0..en + 1);
                rot.cols(b, en, na, 0..en + 1);
                if let Some(z) = z.as_deref_mut() {
                    rot.cols(z, en, na, 0..n);
                }
            }
            finish_real_pair(a, b, &mut alfr, &mut alfi, &mut beta, na, en);
        } else {
            // Full 2 x 2 block, normalized by its row norms
            let an = a[[na, na]].abs() + a[[na, en]].abs() + a[[en, na]].abs() + a[[en, en]].abs();
            let bn = b[[na, na]].abs() + b[[na, en]].abs() + b[[en, en]].abs();
            let a11 = a[[na, na]] / an;
            let a12 = a[[na, en]] / an;
            let a21 = a[[en, na]] / an;
            let a22 = a[[en, en]] / an;
            let b11 = b[[na, na]] / bn;
            let b12 = b[[na, en]] / bn;
            let b22 = b[[en, en]] / bn;

            let mut e = a11 / b11;
            let ei = a22 / b22;
            let s = a21 / (b11 * b22);
            let mut t = (a22 - e * b22) / b22;
            if e.abs() > ei.abs() {
                e = ei;
                t = (a11 - e * b11) / b11;
            }
            let c = 0.5 * (t - s * b12);
            let d = c * c + s * (a12 - e * b12);

            if d < 0.0 {
                // Two complex roots, resolved without mutating the pencil
                complex_pair(
                    a11, a12, a21, a22, b11, b12, b22, e, c, d, an, bn, na, en, &mut alfr,
                    &mut alfi, &mut beta,
                );
            } else {
                // Two real roots: zero both a(en, na) and b(en, na)
                e += c + sign(d.sqrt(), c);
                let a11s = a11 - e * b11;
                let a12s = a12 - e * b12;
                let a22s = a22 - e * b22;

                let (a1, a2) = if a11s.abs() + a12s.abs() >= a21.abs() + a22s.abs() {
                    (a12s, a11s)
                } else {
                    (a22s, a21)
                };
                if let Some(rot) = Rot2::new(a1, a2) {
                    rot.cols(a, en, na, 0..en + 1);
                    rot.cols(b, en, na, 0..en + 1);
                    if let Some(z) = z.as_deref_mut() {
                        rot.cols(z, en, na, 0..n);
                    }
                }

                let (q1, q2) = if an < e.abs() * bn {
                    (a[[na, na]], a[[en, na]])
                } else {
                    (b[[na, na]], b[[en, na]])
                };
                if let Some(rot) = Rot2::new(q1, q2) {
                    rot.rows(a, na, en, na..n);
                    rot.rows(b, na, en, na..n);
                }
                finish_real_pair(a, b, &mut alfr, &mut alfi, &mut beta, na, en);
            }
        }
        pair_done = true;
    }

    (alfr, alfi, beta)
}

/// Reads a decoupled real 2 x 2 block off the diagonal.
fn finish_real_pair(
    a: &mut Array2<f64>,
    b: &mut Array2<f64>,
    alfr: &mut Array1<f64>,
    alfi: &mut Array1<f64>,
    beta: &mut Array1<f64>,
    na: usize,
    en: usize,
) {
    a[[en, na]] = 0.0;
    b[[en, na]] = 0.0;
    alfr[na] = if b[[na, na]] < 0.0 {
        -a[[na, na]]
    } else {
        a[[na, na]]
    };
    alfr[en] = if b[[en, en]] < 0.0 {
        -a[[en, en]]
    } else {
        a[[en, en]]
    };
    beta[na] = b[[na, na]].abs();
    beta[en] = b[[en, en]].abs();
    alfi[en] = 0.0;
    alfi[na] = 0.0;
}

/// Resolves a 2 x 2 block with complex conjugate roots.
///
/// Forms the complex rotations that would diagonalize the normalized block,
/// computes the diagonal entries they would produce and derives both members
/// of the conjugate pair from them. The member with positive imaginary part
/// lands at index `na`.
#[allow(clippy::too_many_arguments)]
fn complex_pair(
    a11: f64,
    a12: f64,
    a21: f64,
    a22: f64,
    b11: f64,
    b12: f64,
    b22: f64,
    e: f64,
    c: f64,
    d: f64,
    an: f64,
    bn: f64,
    na: usize,
    en: usize,
    alfr: &mut Array1<f64>,
    alfi: &mut Array1<f64>,
    beta: &mut Array1<f64>,
) {
    let e = e + c;
    let ei = (-d).sqrt();
    let a11r = a11 - e * b11;
    let a11i = ei * b11;
    let a12r = a12 - e * b12;
    let a12i = ei * b12;
    let a22r = a22 - e * b22;
    let a22i = ei * b22;

    let (a1, a1i, a2, a2i);
    if a11r.abs() + a11i.abs() + a12r.abs() + a12i.abs() >= a21.abs() + a22r.abs() + a22i.abs() {
        a1 = a12r;
        a1i = a12i;
        a2 = -a11r;
        a2i = -a11i;
    } else {
        a1 = a22r;
        a1i = a22i;
        a2 = -a21;
        a2i = 0.0;
    }

    // Complex z rotation
    let mut cz = (a1 * a1 + a1i * a1i).sqrt();
    let (mut szr, mut szi);
    if cz != 0.0 {
        szr = (a1 * a2 + a1i * a2i) / cz;
        szi = (a1 * a2i - a1i * a2) / cz;
        let r = (cz * cz + szr * szr + szi * szi).sqrt();
        cz /= r;
        szr /= r;
        szi /= r;
    } else {
        szr = 1.0;
        szi = 0.0;
    }

    let (d1, d1i, d2, d2i);
    if an >= (e.abs() + ei) * bn {
        d1 = cz * b11 + szr * b12;
        d1i = szi * b12;
        d2 = szr * b22;
        d2i = szi * b22;
    } else {
        d1 = cz * a11 + szr * a12;
        d1i = szi * a12;
        d2 = cz * a21 + szr * a22;
        d2i = szi * a22;
    }

    // Complex q rotation
    let mut cq = (d1 * d1 + d1i * d1i).sqrt();
    let (mut sqr, mut sqi);
    if cq != 0.0 {
        sqr = (d1 * d2 + d1i * d2i) / cq;
        sqi = (d1 * d2i - d1i * d2) / cq;
        let r = (cq * cq + sqr * sqr + sqi * sqi).sqrt();
        cq /= r;
        sqr /= r;
        sqi /= r;
    } else {
        sqr = 1.0;
        sqi = 0.0;
    }

    // Diagonal entries that would result if the transformations were applied
    let ssr = sqr * szr + sqi * szi;
    let ssi = sqr * szi - sqi * szr;

    let mut store = |tr: f64, ti: f64, dr: f64, di: f64| {
        let t = ti * dr - tr * di;
        let j = if t < 0.0 { en } else { na };
        let r = (dr * dr + di * di).sqrt();
        beta[j] = bn * r;
        alfr[j] = an * (tr * dr + ti * di) / r;
        alfi[j] = an * t / r;
    };

    store(
        cq * cz * a11 + cq * szr * a12 + sqr * cz * a21 + ssr * a22,
        cq * szi * a12 - sqi * cz * a21 + ssi * a22,
        cq * cz * b11 + cq * szr * b12 + ssr * b22,
        cq * szi * b12 + ssi * b22,
    );
    store(
        ssr * a11 - sqr * cz * a12 - cq * szr * a21 + cq * cz * a22,
        -ssi * a11 - sqi * cz * a12 + cq * szi * a21,
        ssr * b11 - sqr * cz * b12 + cq * cz * b22,
        -ssi * b11 - sqi * cz * b12,
    );
}

/// Computes the eigenvectors of the quasi-triangular pencil and transforms
/// them back to the original coordinate system.
///
/// For each eigenvalue from the highest index down, the corresponding column
/// of a triangular eigenvector matrix is obtained by back substitution with
/// 1 x 1 and 2 x 2 pivot handling, stored into the buffer of B which is
/// reused as workspace. Real eigenvalues produce one real column; conjugate
/// pairs produce a real/imaginary column pair through paired scalar complex
/// divisions. Pivots that vanish exactly are replaced by `epsb`. The
/// triangular solution is then multiplied into `z` and every column (or
/// column pair) is normalized so its largest component magnitude is 1.
pub fn qz_eigenvectors(
    a: &Array2<f64>,
    b: &mut Array2<f64>,
    alfr: &Array1<f64>,
    alfi: &Array1<f64>,
    beta: &Array1<f64>,
    z: &mut Array2<f64>,
    ctx: &QzContext,
) {
    let n = a.nrows();
    let epsb = ctx.epsb;

    let mut pair_done = false;
    for nn in 0..n {
        let en = n - 1 - nn;
        if pair_done {
            pair_done = false;
            continue;
        }

        if alfi[en] == 0.0 {
            // Real vector
            let mut m = en;
            b[[en, en]] = 1.0;
            if en == 0 {
                continue;
            }
            let na = en - 1;
            let alfm = alfr[m];
            let betm = beta[m];

            let mut two_by_two = false;
            let mut zz = 0.0_f64;
            let mut s = 0.0_f64;
            for i in (0..=na).rev() {
                let w = betm * a[[i, i]] - alfm * b[[i, i]];
                let mut r = 0.0;
                for j in m..=en {
                    r += (betm * a[[i, j]] - alfm * b[[i, j]]) * b[[j, en]];
                }

                if i != 0 && !two_by_two && betm * a[[i, i - 1]] != 0.0 {
                    zz = w;
                    s = r;
                    two_by_two = true;
                    continue;
                }

                m = i;
                if two_by_two {
                    // Real 2 x 2 block
                    let x = betm * a[[i, i + 1]] - alfm * b[[i, i + 1]];
                    let y = betm * a[[i + 1, i]];
                    let q = w * zz - x * y;
                    let t = (x * s - zz * r) / q;
                    b[[i, en]] = t;
                    if x.abs() > zz.abs() {
                        b[[i + 1, en]] = (-r - w * t) / x;
                    } else {
                        b[[i + 1, en]] = (-s - y * t) / zz;
                    }
                    two_by_two = false;
                } else {
                    // Real 1 x 1 block
                    let t = if w == 0.0 { epsb } else { w };
                    b[[i, en]] = -r / t;
                }
            }
        } else {
            // Complex vector, columns na (real part) and en (imaginary part)
            let na = en - 1;
            let mut m = na;
            let almr = alfr[m];
            let almi = alfi[m];
            let betm = beta[m];

            // Last component chosen so the eigenvector matrix is triangular
            let y = betm * a[[en, na]];
            b[[na, na]] = -almi * b[[en, en]] / y;
            b[[na, en]] = (almr * b[[en, en]] - betm * a[[en, en]]) / y;
            b[[en, na]] = 0.0;
            b[[en, en]] = 1.0;

            let mut two_by_two = false;
            let mut zz = 0.0_f64;
            let mut z1 = 0.0_f64;
            let mut r = 0.0_f64;
            let mut s = 0.0_f64;
            for i in (0..na).rev() {
                let w = betm * a[[i, i]] - almr * b[[i, i]];
                let w1 = -almi * b[[i, i]];
                let mut ra = 0.0;
                let mut sa = 0.0;
                for j in m..=en {
                    let x = betm * a[[i, j]] - almr * b[[i, j]];
                    let x1 = -almi * b[[i, j]];
                    ra += x * b[[j, na]] - x1 * b[[j, en]];
                    sa += x * b[[j, en]] + x1 * b[[j, na]];
                }

                if i != 0 && !two_by_two && betm * a[[i, i - 1]] != 0.0 {
                    zz = w;
                    z1 = w1;
                    r = ra;
                    s = sa;
                    two_by_two = true;
                    continue;
                }

                m = i;
                if !two_by_two {
                    // Complex 1 x 1 block
                    let (t1, t2) = cdiv(-ra, -sa, w, w1);
                    b[[i, na]] = t1;
                    b[[i, en]] = t2;
                } else {
                    // Complex 2 x 2 block
                    let x = betm * a[[i, i + 1]] - almr * b[[i, i + 1]];
                    let x1 = -almi * b[[i, i + 1]];
                    let y = betm * a[[i + 1, i]];
                    let tr = y * ra - w * r + w1 * s;
                    let ti = y * sa - w * s - w1 * r;
                    let mut dr = w * zz - w1 * z1 - x * y;
                    let di = w * z1 + w1 * zz - x1 * y;
                    if dr == 0.0 && di == 0.0 {
                        dr = epsb;
                    }
                    let (t1, t2) = cdiv(tr, ti, dr, di);
                    b[[i + 1, na]] = t1;
                    b[[i + 1, en]] = t2;
                    two_by_two = false;

                    let (t1, t2) = if y.abs() > w.abs() + w1.abs() {
                        (
                            (-r - zz * b[[i + 1, na]] + z1 * b[[i + 1, en]]) / y,
                            (-s - zz * b[[i + 1, en]] - z1 * b[[i + 1, na]]) / y,
                        )
                    } else {
                        let tr = -ra - x * b[[i + 1, na]] + x1 * b[[i + 1, en]];
                        let ti = -sa - x * b[[i + 1, en]] - x1 * b[[i + 1, na]];
                        cdiv(tr, ti, w, w1)
                    };
                    b[[i, na]] = t1;
                    b[[i, en]] = t2;
                }
            }
            pair_done = true;
        }
    }

    // Transform the triangular solution to the original coordinate system
    for j in (0..n).rev() {
        for i in 0..n {
            let mut acc = 0.0;
            for k in 0..=j {
                acc += z[[i, k]] * b[[k, j]];
            }
            z[[i, j]] = acc;
        }
    }

    // Normalize so the largest component magnitude of each vector is 1
    let mut second_of_pair = false;
    for j in 0..n {
        if second_of_pair {
            let mut d = 0.0_f64;
            for i in 0..n {
                let mut r = z[[i, j - 1]].abs() + z[[i, j]].abs();
                if r != 0.0 {
                    let u1 = z[[i, j - 1]] / r;
                    let u2 = z[[i, j]] / r;
                    r *= (u1 * u1 + u2 * u2).sqrt();
                }
                if r > d {
                    d = r;
                }
            }
            if d != 0.0 {
                for i in 0..n {
                    z[[i, j - 1]] /= d;
                    z[[i, j]] /= d;
                }
            }
            second_of_pair = false;
        } else if alfi[j] != 0.0 {
            second_of_pair = true;
        } else {
            let mut d = 0.0_f64;
            for i in 0..n {
                if z[[i, j]].abs() > d {
                    d = z[[i, j]].abs();
                }
            }
            if d != 0.0 {
                for i in 0..n {
                    z[[i, j]] /= d;
                }
            }
        }
    }
}

fn validate_pencil(a: &Array2<f64>, b: &Array2<f64>) -> Result<usize, EigenError> {
    if a.nrows() != a.ncols() {
        return Err(EigenError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        });
    }
    if b.nrows() != b.ncols() {
        return Err(EigenError::NotSquare {
            rows: b.nrows(),
            cols: b.ncols(),
        });
    }
    if a.nrows() != b.nrows() {
        return Err(EigenError::ShapeMismatch {
            a_order: a.nrows(),
            b_order: b.nrows(),
        });
    }
    if a.nrows() == 0 {
        return Err(EigenError::EmptyPencil);
    }
    Ok(a.nrows())
}

/// Sorted permutation: descending |alfr|, ties broken by descending |alfi|.
///
/// The sort is stable, so the members of a conjugate pair (identical keys)
/// keep their relative order and stay adjacent.
fn sort_order(alfr: &Array1<f64>, alfi: &Array1<f64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..alfr.len()).collect();
    order.sort_by(|&i, &j| {
        alfr[j]
            .abs()
            .total_cmp(&alfr[i].abs())
            .then_with(|| alfi[j].abs().total_cmp(&alfi[i].abs()))
    });
    order
}

/// Computes the generalized eigenvalues and eigenvectors of a real pencil.
///
/// Runs the four-stage QZ pipeline on working copies of `a` and `b`, sorts
/// the eigenpairs by descending magnitude and returns them together with the
/// eigenvectors in the original coordinate system. The inputs are not
/// modified.
///
/// # Arguments
///
/// * `a` - N x N matrix of the pencil (A, B)
/// * `b` - N x N matrix of the pencil; should be nonsingular for a
///   well-posed problem. A singular B yields infinite eigenvalues.
///
/// # Returns
///
/// * `Ok(GeneralizedEigen)` - Sorted eigenvalues and eigenvectors
/// * `Err(EigenError)` - Invalid shapes, or the iteration stage failed to
///   converge within its 30*n budget
///
/// Callers that want the best-effort spectrum of an unconverged pencil can
/// run [`hessenberg_triangular`], [`qz_iterate`], [`qz_eigenvalues`] and
/// [`qz_eigenvectors`] directly.
///
/// # Examples
///
/// ```
/// use ndarray::arr2;
/// use geneig_rs::qz::generalized_eigen;
///
/// let a = arr2(&[[3.0]]);
/// let b = arr2(&[[2.0]]);
/// let eig = generalized_eigen(&a, &b).unwrap();
/// assert!((eig.values_re[0] - 1.5).abs() < 1e-12);
/// assert_eq!(eig.values_im[0], 0.0);
/// assert_eq!(eig.vectors[[0, 0]], 1.0);
/// ```
///
/// Eigenvalues come back sorted by descending magnitude with the matching
/// eigenvectors as columns:
///
/// ```
/// use ndarray::arr2;
/// use geneig_rs::qz::generalized_eigen;
///
/// let a = arr2(&[[4.0, 0.0], [0.0, 9.0]]);
/// let b = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
/// let eig = generalized_eigen(&a, &b).unwrap();
/// assert!((eig.values_re[0] - 9.0).abs() < 1e-10);
/// assert!((eig.values_re[1] - 4.0).abs() < 1e-10);
/// assert!((eig.vectors[[1, 0]].abs() - 1.0).abs() < 1e-10);
/// assert!((eig.vectors[[0, 1]].abs() - 1.0).abs() < 1e-10);
/// ```
pub fn generalized_eigen(
    a: &Array2<f64>,
    b: &Array2<f64>,
) -> Result<GeneralizedEigen, EigenError> {
    let n = validate_pencil(a, b)?;

    let mut wa = a.clone();
    let mut wb = b.clone();
    let mut z = Array2::<f64>::zeros((n, n));

    hessenberg_triangular(&mut wa, &mut wb, Some(&mut z));
    let ctx = qz_iterate(&mut wa, &mut wb, Some(&mut z), UNIT_ROUNDOFF);
    if let Some(index) = ctx.unconverged {
        return Err(EigenError::NonConvergence { index });
    }
    let (alfr, alfi, beta) = qz_eigenvalues(&mut wa, &mut wb, Some(&mut z), &ctx);
    qz_eigenvectors(&wa, &mut wb, &alfr, &alfi, &beta, &mut z, &ctx);

    let order = sort_order(&alfr, &alfi);
    let mut values_re = Array1::<f64>::zeros(n);
    let mut values_im = Array1::<f64>::zeros(n);
    let mut vectors = Array2::<f64>::zeros((n, n));
    for (pos, &src) in order.iter().enumerate() {
        values_re[pos] = alfr[src] / beta[src];
        values_im[pos] = alfi[src] / beta[src];
        for row in 0..n {
            vectors[[row, pos]] = z[[row, src]];
        }
    }

    Ok(GeneralizedEigen {
        values_re,
        values_im,
        vectors,
    })
}

/// Computes only the generalized eigenvalues of a real pencil.
///
/// Skips transform accumulation and back substitution, which roughly halves
/// the work of [`generalized_eigen`] when eigenvectors are not needed.
/// Returns the sorted `(real, imaginary)` parts.
///
/// ```
/// use ndarray::arr2;
/// use geneig_rs::qz::generalized_eigenvalues;
///
/// let a = arr2(&[[4.0, 1.0], [0.0, 9.0]]);
/// let b = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
/// let (re, im) = generalized_eigenvalues(&a, &b).unwrap();
/// assert!((re[0] - 9.0).abs() < 1e-10);
/// assert!((re[1] - 4.0).abs() < 1e-10);
/// assert_eq!(im[0], 0.0);
/// ```
pub fn generalized_eigenvalues(
    a: &Array2<f64>,
    b: &Array2<f64>,
) -> Result<(Array1<f64>, Array1<f64>), EigenError> {
    let n = validate_pencil(a, b)?;

    let mut wa = a.clone();
    let mut wb = b.clone();

    hessenberg_triangular(&mut wa, &mut wb, None);
    let ctx = qz_iterate(&mut wa, &mut wb, None, UNIT_ROUNDOFF);
    if let Some(index) = ctx.unconverged {
        return Err(EigenError::NonConvergence { index });
    }
    let (alfr, alfi, beta) = qz_eigenvalues(&mut wa, &mut wb, None, &ctx);

    let order = sort_order(&alfr, &alfi);
    let mut re = Array1::<f64>::zeros(n);
    let mut im = Array1::<f64>::zeros(n);
    for (pos, &src) in order.iter().enumerate() {
        re[pos] = alfr[src] / beta[src];
        im[pos] = alfi[src] / beta[src];
    }
    Ok((re, im))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    const TOL: f64 = 1e-10;

    fn pencil_5x5() -> (Array2<f64>, Array2<f64>) {
        let a = arr2(&[
            [2.0, -1.0, 3.0, 0.5, 1.0],
            [4.0, 2.0, -2.0, 1.0, 0.0],
            [-1.0, 3.0, 1.0, 2.0, 2.5],
            [0.5, 1.0, -1.0, 3.0, -2.0],
            [2.0, 0.0, 1.5, -1.0, 1.0],
        ]);
        let b = arr2(&[
            [8.0, 1.0, 0.5, 1.0, 0.0],
            [1.0, 7.0, 1.0, 0.5, 1.0],
            [0.5, 1.0, 9.0, 1.0, 0.5],
            [1.0, 0.5, 1.0, 8.0, 1.0],
            [0.0, 1.0, 0.5, 1.0, 7.0],
        ]);
        (a, b)
    }

    #[test]
    fn reduction_produces_hessenberg_triangular_form() {
        let (mut a, mut b) = pencil_5x5();
        let mut z = Array2::zeros((5, 5));
        hessenberg_triangular(&mut a, &mut b, Some(&mut z));

        for i in 0..5 {
            for j in 0..5 {
                if i > j {
                    assert!(b[[i, j]].abs() < TOL, "B[{},{}] = {}", i, j, b[[i, j]]);
                }
                if i > j + 1 {
                    assert!(a[[i, j]].abs() < TOL, "A[{},{}] = {}", i, j, a[[i, j]]);
                }
            }
        }

        // Z stays orthogonal
        let ztz = z.t().dot(&z);
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (ztz[[i, j]] - expected).abs() < TOL,
                    "Z^T Z [{},{}] = {}",
                    i,
                    j,
                    ztz[[i, j]]
                );
            }
        }
    }

    #[test]
    fn iteration_produces_quasi_triangular_form() {
        let (mut a, mut b) = pencil_5x5();
        let mut z = Array2::zeros((5, 5));
        hessenberg_triangular(&mut a, &mut b, Some(&mut z));
        let ctx = qz_iterate(&mut a, &mut b, Some(&mut z), UNIT_ROUNDOFF);
        assert!(ctx.unconverged.is_none());

        // B stays upper triangular
        for i in 0..5 {
            for j in 0..i {
                assert!(b[[i, j]].abs() <= ctx.epsb, "B[{},{}] = {}", i, j, b[[i, j]]);
            }
        }
        // No two consecutive nonzero sub-diagonal entries of A
        for i in 1..4 {
            let lower = a[[i, i - 1]].abs();
            let upper = a[[i + 1, i]].abs();
            assert!(
                lower <= ctx.epsa || upper <= ctx.epsa,
                "overlapping blocks at {}: {} and {}",
                i,
                lower,
                upper
            );
        }
    }

    #[test]
    fn rotation_pencil_gives_conjugate_pair() {
        let a = arr2(&[[0.0, -1.0], [1.0, 0.0]]);
        let b = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        let eig = generalized_eigen(&a, &b).unwrap();

        assert!(eig.values_re[0].abs() < TOL);
        assert!(eig.values_re[1].abs() < TOL);
        assert!((eig.values_im[0] - 1.0).abs() < TOL);
        assert!((eig.values_im[1] + 1.0).abs() < TOL);
    }

    #[test]
    fn spectrum_matches_trace_for_identity_b() {
        let a = arr2(&[[1.0, 2.0, 3.0], [8.0, 1.0, 4.0], [3.0, 2.0, 3.0]]);
        let b = Array2::eye(3);
        let eig = generalized_eigen(&a, &b).unwrap();

        let trace = a[[0, 0]] + a[[1, 1]] + a[[2, 2]];
        let re_sum: f64 = eig.values_re.iter().sum();
        let im_sum: f64 = eig.values_im.iter().sum();
        assert!((re_sum - trace).abs() < 1e-8, "re sum {}", re_sum);
        assert!(im_sum.abs() < 1e-8, "im sum {}", im_sum);
    }

    #[test]
    fn eigenvalues_only_matches_full_decomposition() {
        let (a, b) = pencil_5x5();
        let eig = generalized_eigen(&a, &b).unwrap();
        let (re, im) = generalized_eigenvalues(&a, &b).unwrap();
        for i in 0..5 {
            assert!((re[i] - eig.values_re[i]).abs() < 1e-8);
            assert!((im[i] - eig.values_im[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn sort_is_descending_by_real_then_imaginary_part() {
        // identity B keeps every beta at 1, so the returned parts carry the
        // sort keys directly
        let (a, _) = pencil_5x5();
        let b = Array2::eye(5);
        let eig = generalized_eigen(&a, &b).unwrap();
        for i in 1..5 {
            let prev = eig.values_re[i - 1].abs();
            let curr = eig.values_re[i].abs();
            assert!(
                prev > curr - 1e-9
                    || ((prev - curr).abs() < 1e-9
                        && eig.values_im[i - 1].abs() >= eig.values_im[i].abs() - 1e-9),
                "order violated at {}: ({}, {}) then ({}, {})",
                i,
                eig.values_re[i - 1],
                eig.values_im[i - 1],
                eig.values_re[i],
                eig.values_im[i]
            );
        }
    }

    #[test]
    fn rejects_invalid_shapes() {
        let a = Array2::<f64>::zeros((0, 0));
        let b = Array2::<f64>::zeros((0, 0));
        assert_eq!(
            generalized_eigen(&a, &b).unwrap_err(),
            EigenError::EmptyPencil
        );

        let a = Array2::<f64>::zeros((2, 3));
        let b = Array2::<f64>::zeros((2, 2));
        assert_eq!(
            generalized_eigen(&a, &b).unwrap_err(),
            EigenError::NotSquare { rows: 2, cols: 3 }
        );

        let a = Array2::<f64>::zeros((3, 3));
        let b = Array2::<f64>::zeros((2, 2));
        assert_eq!(
            generalized_eigen(&a, &b).unwrap_err(),
            EigenError::ShapeMismatch {
                a_order: 3,
                b_order: 2
            }
        );
    }

    #[test]
    fn cdiv_matches_direct_complex_division() {
        let (re, im) = cdiv(3.0, 4.0, 1.0, 2.0);
        // (3 + 4i) / (1 + 2i) = (11 - 2i) / 5
        assert!((re - 2.2).abs() < TOL);
        assert!((im + 0.4).abs() < TOL);

        let (re, im) = cdiv(1.0, 0.0, 0.0, 1.0);
        assert!(re.abs() < TOL);
        assert!((im + 1.0).abs() < TOL);
    }
}
