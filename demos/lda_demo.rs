//! Demonstration of linear discriminant analysis
//!
//! Accumulates a small labeled dataset with three classes in four
//! dimensions, solves for the discriminant directions and projects the
//! samples onto the two leading ones.

use geneig_rs::lda::Lda;
use ndarray::arr1;

fn main() {
    println!("=== Linear Discriminant Analysis ===\n");

    let samples: [([f64; 4], usize); 9] = [
        ([5.1, 3.5, 1.4, 0.2], 0),
        ([4.9, 3.0, 1.4, 0.2], 0),
        ([4.7, 3.2, 1.3, 0.2], 0),
        ([7.0, 3.2, 4.7, 1.4], 1),
        ([6.4, 3.2, 4.5, 1.5], 1),
        ([6.9, 3.1, 4.9, 1.5], 1),
        ([6.3, 3.3, 6.0, 2.5], 2),
        ([5.8, 2.7, 5.1, 1.9], 2),
        ([7.1, 3.0, 5.9, 2.1], 2),
    ];

    let mut lda = Lda::new(4, 3).expect("valid shape");
    for (v, class) in &samples {
        lda.add(&arr1(v), *class).expect("valid sample");
    }
    println!("accumulated {} samples in {} classes", lda.count(), lda.classes());

    let model = match lda.solve() {
        Ok(model) => model,
        Err(e) => {
            println!("solve failed: {}", e);
            return;
        }
    };

    println!("\nDiscriminative eigenvalues:");
    for v in model.values.iter() {
        println!("  {:12.4}", v);
    }

    println!("\nSamples projected onto the two leading directions:");
    for (i, (v, class)) in samples.iter().enumerate() {
        let p = model.project(&arr1(v), 2).expect("valid projection");
        println!("  {}. class {}: ({:8.3}, {:8.3})", i + 1, class, p[0], p[1]);
    }
}
