//! Linear Discriminant Analysis
//!
//! This module builds Fisher discriminant directions from streamed, labeled
//! samples. An [`Lda`] accumulator collects per-class statistics one sample
//! at a time; [`Lda::solve`] assembles the within-class scatter matrix Sw
//! (sum of per-class scatter) and the between-class scatter matrix Sb (sum
//! over classes of the outer product of the centered class means, weighted
//! by class size), then hands the pencil (Sb, Sw) to the generalized
//! eigenvalue decomposition in [`crate::qz`]. The resulting
//! [`Discriminant`] holds the directions ranked by descending separability
//! and projects new samples onto the leading ones.
//!
//! Accumulation is streaming: only the grand mean, per-class centroid sums
//! and per-class raw second moments are kept, so memory is O(q * d * d)
//! regardless of the number of samples.

use ndarray::{s, Array1, Array2};

use crate::qz::{generalized_eigen, EigenError};

/// Error type for the discriminant analysis API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LdaError {
    /// Requested shape is unusable (`dim` and `classes` must be positive and
    /// `classes <= dim`)
    InvalidShape { dim: usize, classes: usize },
    /// Class label outside `0..classes`
    ClassOutOfRange { class: usize, classes: usize },
    /// Sample length does not match the accumulator dimension
    DimensionMismatch { expected: usize, got: usize },
    /// A class received no samples before the solve
    EmptyClass { class: usize },
    /// Requested projection width is zero or exceeds the dimension
    ComponentCount { requested: usize, available: usize },
    /// The eigenvalue decomposition of the scatter pencil failed
    Eigen(EigenError),
}

impl std::fmt::Display for LdaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LdaError::InvalidShape { dim, classes } => {
                write!(
                    f,
                    "invalid discriminant shape: dim = {}, classes = {}",
                    dim, classes
                )
            }
            LdaError::ClassOutOfRange { class, classes } => {
                write!(f, "class index {} out of range 0..{}", class, classes)
            }
            LdaError::DimensionMismatch { expected, got } => {
                write!(f, "sample has {} components, expected {}", got, expected)
            }
            LdaError::EmptyClass { class } => {
                write!(f, "class {} received no samples", class)
            }
            LdaError::ComponentCount {
                requested,
                available,
            } => {
                write!(
                    f,
                    "cannot project onto {} components, {} available",
                    requested, available
                )
            }
            LdaError::Eigen(e) => write!(f, "scatter pencil decomposition failed: {}", e),
        }
    }
}

impl std::error::Error for LdaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LdaError::Eigen(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EigenError> for LdaError {
    fn from(e: EigenError) -> Self {
        LdaError::Eigen(e)
    }
}

/// Streaming accumulator of per-class statistics for discriminant analysis.
///
/// Create with [`Lda::new`], feed labeled samples with [`Lda::add`], then
/// call [`Lda::solve`] to obtain the [`Discriminant`]. `solve` consumes the
/// accumulator, so no sample can be added after the solve.
///
/// # Examples
///
/// Two well-separated classes along the first axis. The discriminant
/// direction recovers that axis and the projection separates the classes by
/// construction:
///
/// ```
/// use ndarray::arr1;
/// use geneig_rs::lda::Lda;
///
/// let mut lda = Lda::new(2, 2).unwrap();
/// for p in [[-1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, -1.0]] {
///     lda.add(&arr1(&p), 0).unwrap();
/// }
/// for p in [[9.0, 0.0], [11.0, 0.0], [10.0, 1.0], [10.0, -1.0]] {
///     lda.add(&arr1(&p), 1).unwrap();
/// }
///
/// let model = lda.solve().unwrap();
/// assert!((model.values[0] - 50.0).abs() < 1e-8);
/// assert!(model.values[1].abs() < 1e-8);
///
/// let proj = model.project(&arr1(&[11.0, 0.0]), 1).unwrap();
/// assert!((proj[0].abs() - 11.0).abs() < 1e-8);
/// ```
#[derive(Debug, Clone)]
pub struct Lda {
    dim: usize,
    classes: usize,
    count: usize,
    class_counts: Vec<usize>,
    /// Per-class raw second moments, accumulated on the upper triangle
    moments: Vec<Array2<f64>>,
    /// Per-class component sums, divided into centroids by the solve
    centroids: Vec<Array1<f64>>,
    /// Grand component sum, divided into the mean by the solve
    mean: Array1<f64>,
}

impl Lda {
    /// Creates an accumulator for `dim`-dimensional samples in `classes`
    /// classes. Requires `dim > 0` and `0 < classes <= dim`.
    pub fn new(dim: usize, classes: usize) -> Result<Lda, LdaError> {
        if dim == 0 || classes == 0 || classes > dim {
            return Err(LdaError::InvalidShape { dim, classes });
        }
        Ok(Lda {
            dim,
            classes,
            count: 0,
            class_counts: vec![0; classes],
            moments: vec![Array2::zeros((dim, dim)); classes],
            centroids: vec![Array1::zeros(dim); classes],
            mean: Array1::zeros(dim),
        })
    }

    /// Sample dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of classes.
    #[inline]
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Total number of samples accumulated so far.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Accumulates one labeled sample and returns the running total count.
    ///
    /// Updates the grand sum, the class sum and the upper triangle of the
    /// class raw second-moment matrix.
    pub fn add(&mut self, sample: &Array1<f64>, class: usize) -> Result<usize, LdaError> {
        if sample.len() != self.dim {
            return Err(LdaError::DimensionMismatch {
                expected: self.dim,
                got: sample.len(),
            });
        }
        if class >= self.classes {
            return Err(LdaError::ClassOutOfRange {
                class,
                classes: self.classes,
            });
        }

        for i in 0..self.dim {
            self.mean[i] += sample[i];
            self.centroids[class][i] += sample[i];
            for j in i..self.dim {
                self.moments[class][[i, j]] += sample[i] * sample[j];
            }
        }
        self.class_counts[class] += 1;
        self.count += 1;
        Ok(self.count)
    }

    /// Finalizes the statistics and solves for the discriminant directions.
    ///
    /// Per class, the component sums become the centroid and the raw second
    /// moments are centered into the class scatter matrix. The within-class
    /// scatter Sw sums the class scatters; the between-class scatter Sb sums
    /// the outer products of the centered centroids weighted by class size.
    /// The directions are the generalized eigenvectors of (Sb, Sw), ranked
    /// by descending eigenvalue.
    ///
    /// Consumes the accumulator; every class must have received at least one
    /// sample.
    pub fn solve(mut self) -> Result<Discriminant, LdaError> {
        for (class, &n) in self.class_counts.iter().enumerate() {
            if n == 0 {
                return Err(LdaError::EmptyClass { class });
            }
        }

        let d = self.dim;
        let total = self.count as f64;
        self.mean.mapv_inplace(|x| x / total);

        let mut sw = Array2::<f64>::zeros((d, d));
        let mut sb = Array2::<f64>::zeros((d, d));
        for k in 0..self.classes {
            let nk = self.class_counts[k] as f64;
            let centroid = &mut self.centroids[k];
            centroid.mapv_inplace(|x| x / nk);

            // Center the raw second moments into the class scatter and
            // mirror the upper triangle
            let moment = &mut self.moments[k];
            for j in 0..d {
                for i in 0..=j {
                    let v = moment[[i, j]] - centroid[i] * centroid[j] * nk;
                    moment[[i, j]] = v;
                    moment[[j, i]] = v;
                }
            }
            sw += &self.moments[k];

            let centroid = &self.centroids[k];
            for j in 0..d {
                let cj = centroid[j] - self.mean[j];
                for i in 0..d {
                    let ci = centroid[i] - self.mean[i];
                    sb[[i, j]] += nk * ci * cj;
                }
            }
        }

        let eig = generalized_eigen(&sb, &sw)?;
        Ok(Discriminant {
            vectors: eig.vectors,
            values: eig.values_re,
        })
    }
}

/// Discriminant directions produced by [`Lda::solve`].
#[derive(Debug, Clone)]
pub struct Discriminant {
    /// Directions as columns, ranked by descending discriminative eigenvalue
    pub vectors: Array2<f64>,
    /// Generalized eigenvalues of the scatter pencil, one per direction;
    /// larger means better class separation along that direction
    pub values: Array1<f64>,
}

impl Discriminant {
    /// Sample dimension the model was trained on.
    #[inline]
    pub fn dim(&self) -> usize {
        self.vectors.nrows()
    }

    /// Projects a sample onto the leading `components` directions.
    ///
    /// Returns a freshly allocated vector of length `components`, so the
    /// input is never aliased by the output.
    pub fn project(
        &self,
        sample: &Array1<f64>,
        components: usize,
    ) -> Result<Array1<f64>, LdaError> {
        let d = self.dim();
        if sample.len() != d {
            return Err(LdaError::DimensionMismatch {
                expected: d,
                got: sample.len(),
            });
        }
        if components == 0 || components > d {
            return Err(LdaError::ComponentCount {
                requested: components,
                available: d,
            });
        }
        Ok(self.vectors.slice(s![.., ..components]).t().dot(sample))
    }
}
