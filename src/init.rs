//! Initial centroid selection for k-means.
//!
//! | Method | Picks |
//! |--------|-------|
//! | [`InitMethod::Random`] | distinct records drawn without replacement |
//! | [`InitMethod::KMeansPlusPlus`] | records drawn with probability ∝ D(x)² |
//! | [`InitMethod::FarthestFirst`] | the record farthest from the chosen set, repeatedly |
//! | [`InitMethod::Canopy`] | the densest canopy centres |
//!
//! All methods return at most `k` centroids and never return two records
//! with identical values. Fewer than `k` come back when the data has fewer
//! distinct records (or fewer canopies) than requested.
//!
//! ## K-means++
//!
//! 1. Choose the first centroid uniformly at random.
//! 2. Keep, for every record, D(x): the distance to its nearest chosen
//!    centroid. The array is updated after each pick and never grows.
//! 3. Sample the next centroid with probability proportional to D(x)².
//!
//! Arthur & Vassilvitskii (2007), "k-means++: The Advantages of Careful Seeding".

use crate::canopy::{CanopyConfig, Canopies};
use crate::data::{Dataset, Record};
use crate::distance::{Distance, DistanceFunction};
use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Initialisation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InitMethod {
    /// Random distinct records.
    #[default]
    Random,
    /// Distance-weighted sampling.
    #[serde(alias = "k-means++")]
    KMeansPlusPlus,
    /// Canopy centres, densest first.
    Canopy,
    /// Greedy farthest point traversal.
    FarthestFirst,
}

/// Inputs shared by all initialisation methods.
#[derive(Debug, Clone, Copy)]
pub struct SeedContext<'a> {
    /// Data to draw from.
    pub data: &'a Dataset,
    /// Distance used for spreading and canopies.
    pub distance: &'a DistanceFunction,
    /// Requested centroid count.
    pub k: usize,
    /// Prebuilt canopies, reused by [`InitMethod::Canopy`] when present.
    pub canopies: Option<&'a Canopies>,
    /// Used to build canopies when none were supplied.
    pub canopy_config: &'a CanopyConfig,
}

/// Produces starting centroids.
pub trait Seeding {
    /// Choose up to `ctx.k` starting centroids.
    fn initialize<R: Rng + ?Sized>(&self, ctx: &SeedContext<'_>, rng: &mut R) -> Result<Vec<Record>>;
}

impl Seeding for InitMethod {
    fn initialize<R: Rng + ?Sized>(&self, ctx: &SeedContext<'_>, rng: &mut R) -> Result<Vec<Record>> {
        if ctx.data.is_empty() {
            return Err(Error::EmptyInput);
        }
        if ctx.k == 0 {
            return Err(Error::invalid("k", "must be > 0"));
        }
        match self {
            InitMethod::Random => Ok(random(ctx, rng)),
            InitMethod::KMeansPlusPlus => Ok(spread(ctx, rng, Pick::Weighted)),
            InitMethod::FarthestFirst => Ok(spread(ctx, rng, Pick::Farthest)),
            InitMethod::Canopy => match ctx.canopies {
                Some(c) => Ok(c.densest(ctx.k)),
                None => {
                    let c = Canopies::build(ctx.data, ctx.distance, ctx.canopy_config)?;
                    Ok(c.densest(ctx.k))
                }
            },
        }
    }
}

/// Fisher-Yates from the back, skipping records already seen by value.
fn random<R: Rng + ?Sized>(ctx: &SeedContext<'_>, rng: &mut R) -> Vec<Record> {
    let n = ctx.data.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut seen = HashSet::new();
    let mut chosen = Vec::with_capacity(ctx.k);

    for j in (0..n).rev() {
        if chosen.len() == ctx.k {
            break;
        }
        let i = rng.random_range(0..=j);
        let record = ctx.data.record(order[i]);
        if seen.insert(record.key()) {
            chosen.push(record.clone());
        }
        order.swap(i, j);
    }
    chosen
}

#[derive(Clone, Copy)]
enum Pick {
    Weighted,
    Farthest,
}

fn spread<R: Rng + ?Sized>(ctx: &SeedContext<'_>, rng: &mut R, pick: Pick) -> Vec<Record> {
    let data = ctx.data;
    let n = data.len();

    let first = rng.random_range(0..n);
    let mut chosen = vec![data.record(first).clone()];
    let mut seen = HashSet::new();
    seen.insert(data.record(first).key());

    // Distance to nearest chosen centroid
    let mut nearest: Vec<f64> = data
        .records()
        .iter()
        .map(|r| ctx.distance.distance(r, &chosen[0]))
        .collect();

    while chosen.len() < ctx.k {
        let next = match pick {
            Pick::Weighted => {
                let total: f64 = nearest.iter().map(|d| d * d).sum();
                if total <= 0.0 {
                    break;
                }
                let threshold = rng.random::<f64>() * total;
                let mut cumsum = 0.0;
                let mut selected = None;
                for (i, &d) in nearest.iter().enumerate() {
                    if d <= 0.0 {
                        continue;
                    }
                    cumsum += d * d;
                    selected = Some(i);
                    if cumsum >= threshold {
                        break;
                    }
                }
                selected
            }
            Pick::Farthest => nearest
                .iter()
                .enumerate()
                .filter(|(_, d)| **d > 0.0)
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .map(|(i, _)| i),
        };
        let Some(idx) = next else {
            break;
        };

        let candidate = data.record(idx);
        if !seen.insert(candidate.key()) {
            // Duplicate of a chosen centroid: take it out of the draw and resample
            nearest[idx] = 0.0;
            continue;
        }
        for (d, r) in nearest.iter_mut().zip(data.records()) {
            if *d > 0.0 {
                let to_new = ctx.distance.compute(r, candidate, *d);
                if to_new < *d {
                    *d = to_new;
                }
            }
        }
        nearest[idx] = 0.0;
        chosen.push(candidate.clone());
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx<'a>(data: &'a Dataset, f: &'a DistanceFunction, cfg: &'a CanopyConfig, k: usize) -> SeedContext<'a> {
        SeedContext {
            data,
            distance: f,
            k,
            canopies: None,
            canopy_config: cfg,
        }
    }

    fn distinct(records: &[Record]) -> bool {
        let keys: HashSet<_> = records.iter().map(Record::key).collect();
        keys.len() == records.len()
    }

    #[test]
    fn random_skips_duplicates() {
        let rows = vec![vec![1.0], vec![1.0], vec![1.0], vec![2.0], vec![3.0]];
        let data = Dataset::from_rows(&rows).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, true);
        let cfg = CanopyConfig::default();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let c = InitMethod::Random.initialize(&ctx(&data, &f, &cfg, 3), &mut rng).unwrap();
            assert_eq!(c.len(), 3);
            assert!(distinct(&c));
        }
    }

    #[test]
    fn random_stops_when_pool_exhausted() {
        let data = Dataset::from_rows(&[vec![1.0], vec![1.0], vec![2.0]]).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, true);
        let cfg = CanopyConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let c = InitMethod::Random.initialize(&ctx(&data, &f, &cfg, 5), &mut rng).unwrap();
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn kmeans_plus_plus_spreads_out() {
        let mut rows: Vec<Vec<f64>> = (0..20).map(|i| vec![0.01 * i as f64, 0.0]).collect();
        rows.extend((0..20).map(|i| vec![100.0 + 0.01 * i as f64, 100.0]));
        let data = Dataset::from_rows(&rows).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, true);
        let cfg = CanopyConfig::default();
        let mut far_apart = 0;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let c = InitMethod::KMeansPlusPlus
                .initialize(&ctx(&data, &f, &cfg, 2), &mut rng)
                .unwrap();
            assert_eq!(c.len(), 2);
            if f.distance(&c[0], &c[1]) > 1.0 {
                far_apart += 1;
            }
        }
        // D² weighting almost always picks the other group
        assert!(far_apart >= 18, "far_apart = {far_apart}");
    }

    #[test]
    fn kmeans_plus_plus_never_repeats() {
        let rows = vec![vec![0.0], vec![0.0], vec![0.0], vec![5.0]];
        let data = Dataset::from_rows(&rows).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, true);
        let cfg = CanopyConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let c = InitMethod::KMeansPlusPlus
            .initialize(&ctx(&data, &f, &cfg, 4), &mut rng)
            .unwrap();
        assert_eq!(c.len(), 2);
        assert!(distinct(&c));
    }

    #[test]
    fn farthest_first_picks_extremes() {
        let rows: Vec<Vec<f64>> = vec![vec![0.0], vec![4.0], vec![5.0], vec![10.0]];
        let data = Dataset::from_rows(&rows).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, false);
        let cfg = CanopyConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let c = InitMethod::FarthestFirst
            .initialize(&ctx(&data, &f, &cfg, 2), &mut rng)
            .unwrap();
        let xs: Vec<f64> = c.iter().map(|r| r.value(0).as_f64().unwrap()).collect();
        // Whatever the first pick, the second is an end point of the range
        assert!(xs[1] == 0.0 || xs[1] == 10.0);
        assert!(distinct(&c));
    }

    #[test]
    fn canopy_returns_densest_centres() {
        let mut rows: Vec<Vec<f64>> = (0..4).map(|_| vec![0.0]).collect();
        rows.extend((0..8).map(|_| vec![100.0]));
        let data = Dataset::from_rows(&rows).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, false);
        let cfg = CanopyConfig::default().with_t2(1.0).with_t1(2.0);
        let mut rng = StdRng::seed_from_u64(0);
        let c = InitMethod::Canopy.initialize(&ctx(&data, &f, &cfg, 1), &mut rng).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].value(0).as_f64(), Some(100.0));
    }

    #[test]
    fn zero_k_rejected() {
        let data = Dataset::from_rows(&[vec![0.0]]).unwrap();
        let f = DistanceFunction::new(DistanceMetric::Euclidean, &data, true);
        let cfg = CanopyConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(InitMethod::Random.initialize(&ctx(&data, &f, &cfg, 0), &mut rng).is_err());
    }

    #[test]
    fn serde_names() {
        let m: InitMethod = serde_json::from_str("\"k-means++\"").unwrap();
        assert_eq!(m, InitMethod::KMeansPlusPlus);
        let m: InitMethod = serde_json::from_str("\"farthest-first\"").unwrap();
        assert_eq!(m, InitMethod::FarthestFirst);
    }
}
