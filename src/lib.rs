//! geneig-rs: generalized eigenvalue decomposition and discriminant analysis
//!
//! This crate solves the real generalized eigenproblem A * v = lambda * B * v
//! for dense square pencils with the QZ algorithm of Moler and Stewart, and
//! builds Linear Discriminant Analysis on top of it. The decomposition is a
//! dense, O(n^3), in-memory computation intended for small to moderate
//! orders (tens to low hundreds).
//!
//! # Organization
//!
//! The library is organized into modules corresponding to the two layers:
//! - `qz`: the four-stage QZ pipeline (Hessenberg/triangular reduction,
//!   implicit-shift iteration, eigenvalue extraction, eigenvector back
//!   substitution) and the sorting drivers built on it
//! - `lda`: streaming accumulation of labeled samples, scatter-matrix
//!   assembly, and projection onto the leading discriminant directions
//!
//! # Example
//!
//! ```
//! use ndarray::arr2;
//! use geneig_rs::qz::generalized_eigen;
//!
//! let a = arr2(&[[1.0, 2.0, 3.0], [8.0, 1.0, 4.0], [3.0, 2.0, 3.0]]);
//! let b = arr2(&[[5.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 5.0]]);
//!
//! let eig = generalized_eigen(&a, &b).unwrap();
//! // three eigenvalues, sorted by descending magnitude
//! assert_eq!(eig.order(), 3);
//! ```

pub mod lda;
pub mod qz;
