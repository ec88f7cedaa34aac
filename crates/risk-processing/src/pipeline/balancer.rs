//! Minority oversampling (SMOTE) for the training partition.

use crate::error::{PipelineError, Result};
use crate::types::{ClassDistribution, Dataset, FeatureRow};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub before: ClassDistribution,
    pub after: ClassDistribution,
    pub synthesized: usize,
}

/// Synthesizes minority rows by interpolating toward same-class neighbours.
///
/// Continuous features are interpolated. Every other feature (flags, one-hot
/// groups, ordinal codes) is copied as a block from whichever endpoint is
/// nearer the interpolation point, so one-hot groups stay valid.
pub struct SmoteBalancer {
    k_neighbors: usize,
    target_ratio: f64,
    seed: u64,
}

impl SmoteBalancer {
    pub fn new(k_neighbors: usize, target_ratio: f64, seed: u64) -> Self {
        Self {
            k_neighbors,
            target_ratio,
            seed,
        }
    }

    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest same-class rows for each row, ties broken by row order.
    fn neighbour_table(&self, samples: &[&FeatureRow]) -> Vec<Vec<usize>> {
        samples
            .iter()
            .enumerate()
            .map(|(i, sample)| {
                let mut by_distance: Vec<(f64, usize)> = samples
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(j, other)| (Self::distance(&sample.values, &other.values), j))
                    .collect();
                by_distance.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(Ordering::Equal)
                        .then(a.1.cmp(&b.1))
                });
                by_distance
                    .into_iter()
                    .take(self.k_neighbors)
                    .map(|(_, j)| j)
                    .collect()
            })
            .collect()
    }

    fn generate_sample(
        base: &[f64],
        neighbour: &[f64],
        continuous: &[bool],
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let gap: f64 = rng.r#gen();
        let discrete_source = if gap < 0.5 { base } else { neighbour };
        base.iter()
            .zip(neighbour.iter())
            .enumerate()
            .map(|(i, (&p, &n))| {
                if continuous[i] {
                    p + gap * (n - p)
                } else {
                    discrete_source[i]
                }
            })
            .collect()
    }

    /// Append synthetic minority rows to `train` until the target ratio is met.
    ///
    /// # Errors
    ///
    /// `InsufficientMinority` when the minority class has fewer than k + 1
    /// organic rows.
    pub fn balance(&self, train: &mut Dataset) -> Result<BalanceReport> {
        let before = train.class_distribution();
        let (minority_label, minority_count, majority_count) = if before.positive <= before.negative {
            (1u8, before.positive, before.negative)
        } else {
            (0u8, before.negative, before.positive)
        };

        let target = (majority_count as f64 * self.target_ratio).ceil() as usize;
        let n_to_generate = target.saturating_sub(minority_count);
        if n_to_generate == 0 {
            debug!("Training split already balanced: {:?}", before);
            return Ok(BalanceReport {
                before,
                after: before,
                synthesized: 0,
            });
        }

        let samples: Vec<&FeatureRow> = train
            .rows
            .iter()
            .filter(|r| r.label == minority_label && !r.synthetic)
            .collect();
        let required = self.k_neighbors + 1;
        if samples.len() < required {
            return Err(PipelineError::InsufficientMinority {
                found: samples.len(),
                required,
            });
        }

        let continuous: Vec<bool> = train
            .schema
            .features
            .iter()
            .map(|f| f.kind == crate::schema::FeatureKind::Continuous)
            .collect();
        let neighbours = self.neighbour_table(&samples);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let synthetic: Vec<FeatureRow> = (0..n_to_generate)
            .map(|_| {
                let base = rng.gen_range(0..samples.len());
                let neighbour = neighbours[base][rng.gen_range(0..neighbours[base].len())];
                let values = Self::generate_sample(
                    &samples[base].values,
                    &samples[neighbour].values,
                    &continuous,
                    &mut rng,
                );
                FeatureRow::synthetic(values, minority_label)
            })
            .collect();

        train.rows.extend(synthetic);
        let after = train.class_distribution();
        info!(
            "Synthesized {} minority rows: {:?} -> {:?}",
            n_to_generate, before, after
        );

        Ok(BalanceReport {
            before,
            after,
            synthesized: n_to_generate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::splitter::StratifiedSplitter;
    use crate::pipeline::splitter::tests::labelled_dataset;
    use crate::schema::{FeatureSchema, FeatureSpec};

    fn mixed_dataset(positives: usize, negatives: usize) -> Dataset {
        let schema = FeatureSchema::new(vec![
            FeatureSpec::continuous("GPA"),
            FeatureSpec::flag("Gender_Female"),
            FeatureSpec::flag("Gender_Male"),
            FeatureSpec::categorical("GPATier", 0.0, 4.0),
        ]);
        let mut rows = Vec::new();
        for i in 0..positives {
            let female = (i % 2) as f64;
            rows.push(FeatureRow::organic(
                format!("P{i}"),
                vec![i as f64 / positives as f64, female, 1.0 - female, (i % 5) as f64],
                1,
            ));
        }
        for i in 0..negatives {
            rows.push(FeatureRow::organic(format!("N{i}"), vec![0.5, 1.0, 0.0, 0.0], 0));
        }
        Dataset::new(schema, rows)
    }

    #[test]
    fn test_balance_to_equal_counts() {
        let mut train = mixed_dataset(10, 40);
        let report = SmoteBalancer::new(5, 1.0, 42).balance(&mut train).unwrap();

        assert_eq!(report.synthesized, 30);
        assert_eq!(report.after.positive, 40);
        assert_eq!(report.after.negative, 40);
        assert_eq!(train.len(), 80);
        assert!(train.rows[50..].iter().all(|r| r.synthetic && r.student_id.is_none()));
    }

    #[test]
    fn test_synthetic_rows_respect_schema() {
        let mut train = mixed_dataset(12, 60);
        SmoteBalancer::new(5, 1.0, 42).balance(&mut train).unwrap();

        for row in train.rows.iter().filter(|r| r.synthetic) {
            assert!(train.schema.check_row(&row.values, row.label).is_ok());
            assert_eq!(row.values[1] + row.values[2], 1.0, "one-hot group broken");
            assert!((0.0..=1.0).contains(&row.values[0]));
        }
    }

    #[test]
    fn test_balance_partial_ratio() {
        let mut train = mixed_dataset(10, 40);
        let report = SmoteBalancer::new(5, 0.5, 42).balance(&mut train).unwrap();
        assert_eq!(report.after.positive, 20);
    }

    #[test]
    fn test_balance_insufficient_minority() {
        let mut train = mixed_dataset(5, 40);
        let err = SmoteBalancer::new(5, 1.0, 42).balance(&mut train).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientMinority {
                found: 5,
                required: 6
            }
        ));
    }

    #[test]
    fn test_balance_is_deterministic() {
        let mut a = mixed_dataset(10, 40);
        let mut b = mixed_dataset(10, 40);
        SmoteBalancer::new(5, 1.0, 42).balance(&mut a).unwrap();
        SmoteBalancer::new(5, 1.0, 42).balance(&mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_balance_after_split_doubles_majority() {
        let data = labelled_dataset(1000, 10);
        let mut splits = StratifiedSplitter::new(0.15, 0.15, 0.02, 42).split(&data).unwrap();
        let majority = splits.train.dataset.class_distribution().negative;

        SmoteBalancer::new(5, 1.0, 42)
            .balance(&mut splits.train.dataset)
            .unwrap();
        assert_eq!(splits.train.dataset.len(), 2 * majority);
        assert!(splits.val.dataset.rows.iter().all(|r| !r.synthetic));
    }
}
