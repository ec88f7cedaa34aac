//! Stratified train/validation/test partitioning.

use crate::error::{PipelineError, Result};
use crate::types::{Dataset, Split, SplitName, Splits};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Assigns rows to partitions per class so each keeps the source class ratio.
pub struct StratifiedSplitter {
    val_ratio: f64,
    test_ratio: f64,
    tolerance: f64,
    seed: u64,
}

impl StratifiedSplitter {
    /// The train ratio is implied: whatever each class has left after
    /// validation and test are filled.
    pub fn new(val_ratio: f64, test_ratio: f64, tolerance: f64, seed: u64) -> Self {
        Self {
            val_ratio,
            test_ratio,
            tolerance,
            seed,
        }
    }

    /// Split `dataset`. Identical input and seed always give identical membership.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when any partition would hold no positive rows.
    pub fn split(&self, dataset: &Dataset) -> Result<Splits> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assigned: [Vec<usize>; 3] = [Vec::new(), Vec::new(), Vec::new()];

        for label in [0u8, 1u8] {
            let mut indices: Vec<usize> = dataset
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| row.label == label)
                .map(|(i, _)| i)
                .collect();
            indices.shuffle(&mut rng);

            let n = indices.len();
            let n_test = (((n as f64) * self.test_ratio).round() as usize).min(n);
            let n_val = (((n as f64) * self.val_ratio).round() as usize).min(n - n_test);

            let (test, rest) = indices.split_at(n_test);
            let (val, train) = rest.split_at(n_val);
            debug!(
                "Class {}: {} rows -> train {}, val {}, test {}",
                label,
                n,
                train.len(),
                val.len(),
                test.len()
            );
            assigned[0].extend_from_slice(train);
            assigned[1].extend_from_slice(val);
            assigned[2].extend_from_slice(test);
        }

        let [train, val, test] = assigned.map(|mut indices| {
            indices.sort_unstable();
            indices
        });

        let overall = dataset.class_distribution().positive_fraction();
        let splits = Splits {
            train: Self::materialize(dataset, SplitName::Train, train),
            val: Self::materialize(dataset, SplitName::Val, val),
            test: Self::materialize(dataset, SplitName::Test, test),
        };

        for split in splits.iter() {
            let dist = split.dataset.class_distribution();
            if dist.positive == 0 {
                return Err(PipelineError::InsufficientData(format!(
                    "{} split would contain no positive-class rows ({} rows total)",
                    split.name,
                    dist.total()
                )));
            }
            let drift = (dist.positive_fraction() - overall).abs();
            if drift > self.tolerance {
                warn!(
                    "{} split positive share {:.4} drifts {:.4} from overall {:.4}",
                    split.name,
                    dist.positive_fraction(),
                    drift,
                    overall
                );
            }
        }

        Ok(splits)
    }

    fn materialize(dataset: &Dataset, name: SplitName, indices: Vec<usize>) -> Split {
        let rows = indices.iter().map(|&i| dataset.rows[i].clone()).collect();
        Split {
            name,
            dataset: Dataset::new(dataset.schema.clone(), rows),
            indices,
        }
    }
}
