//! Demonstration of the generalized eigenvalue decomposition
//!
//! This example decomposes a small dense pencil (A, B), prints the sorted
//! eigenvalues and eigenvectors, and verifies the defining relation
//! A * v = lambda * B * v for the leading pair.

use geneig_rs::qz::generalized_eigen;
use ndarray::arr2;

fn main() {
    println!("=== Generalized Eigenvalue Decomposition ===\n");

    let a = arr2(&[[1.0, 2.0, 3.0], [8.0, 1.0, 4.0], [3.0, 2.0, 3.0]]);
    let b = arr2(&[[5.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 5.0]]);

    println!("A = \n{:?}", a);
    println!("B = \n{:?}", b);

    match generalized_eigen(&a, &b) {
        Ok(eig) => {
            println!("\nEigenvalues (descending magnitude):");
            for (re, im) in eig.values_re.iter().zip(eig.values_im.iter()) {
                if *im == 0.0 {
                    println!("  λ = {:9.4}", re);
                } else {
                    println!("  λ = {:9.4} {:+.4}i", re, im);
                }
            }

            println!("\nEigenvectors (columns):");
            for i in 0..eig.order() {
                print!("  [");
                for j in 0..eig.order() {
                    print!("{:9.4}", eig.vectors[[i, j]]);
                }
                println!(" ]");
            }

            // Verify A v = lambda B v for the leading real eigenpair
            let lambda = eig.values_re[0];
            let v = eig.vectors.column(0);
            let av = a.dot(&v);
            let bv = b.dot(&v);
            println!("\nLeading pair residual components (A v - λ B v):");
            for i in 0..eig.order() {
                println!("  {:+.2e}", av[i] - lambda * bv[i]);
            }
        }
        Err(e) => println!("decomposition failed: {}", e),
    }
}
