use approx::assert_relative_eq;
use partita::{
    adjusted_rand_index, fit, Algorithm, Attribute, ClusterCount, ClusterModel, Clusterer, ClusteringConfig,
    Dataset, Em, Record, Schema, Value,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn blobs(centres: &[[f64; 2]], per: usize, sd: f64, seed: u64) -> (Dataset, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, sd).unwrap();
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for (label, c) in centres.iter().enumerate() {
        for _ in 0..per {
            rows.push(vec![c[0] + noise.sample(&mut rng), c[1] + noise.sample(&mut rng)]);
            labels.push(label);
        }
    }
    (Dataset::from_rows(&rows).unwrap(), labels)
}

/// Standard normal quantiles at (i + 0.5) / 20.
fn normal_sample() -> Dataset {
    let half = [
        0.06271, 0.18912, 0.31864, 0.45376, 0.59776, 0.75542, 0.93459, 1.15035, 1.43953, 1.95996,
    ];
    let rows: Vec<Vec<f64>> = half.iter().flat_map(|&x| [vec![-x], vec![x]]).collect();
    Dataset::from_rows(&rows).unwrap()
}

#[test]
fn auto_keeps_one_cluster_for_one_gaussian() {
    let model = Em::new().fit(&normal_sample()).unwrap();
    assert!(model.selected_by_cross_validation());
    assert_eq!(model.cluster_count(), 1);
    assert_relative_eq!(model.priors()[0], 1.0);
}

#[test]
fn auto_separates_blobs() {
    let (data, truth) = blobs(&[[0.0, 0.0], [10.0, 10.0]], 50, 1.0, 42);
    let model = Em::new().with_max_clusters(5).fit(&data).unwrap();
    assert!(model.selected_by_cross_validation());
    assert!(model.cluster_count() >= 2);
    let labels = model.assign_all(&data).unwrap();
    if model.cluster_count() == 2 {
        assert!(adjusted_rand_index(&labels, &truth) > 0.95);
    }
}

#[test]
fn fixed_two_matches_generating_groups() {
    let (data, truth) = blobs(&[[0.0, 0.0], [10.0, 10.0]], 50, 1.0, 42);
    let labels = Em::new()
        .with_num_clusters(ClusterCount::Fixed(2))
        .fit_predict(&data)
        .unwrap();
    assert_relative_eq!(adjusted_rand_index(&labels, &truth), 1.0);
}

#[test]
fn same_seed_same_model() {
    let (data, _) = blobs(&[[0.0, 0.0], [4.0, 4.0]], 30, 1.0, 9);
    let fit = || Em::new().with_max_clusters(3).with_seed(5).fit(&data).unwrap();
    let a = fit();
    let b = fit();
    assert_eq!(a.cluster_count(), b.cluster_count());
    assert_eq!(a.params(), b.params());
    assert_eq!(a.log_likelihood_trace(), b.log_likelihood_trace());
    assert_eq!(a.assign_all(&data).unwrap(), b.assign_all(&data).unwrap());
}

#[test]
fn slot_count_does_not_change_assignments() {
    let (data, _) = blobs(&[[0.0, 0.0], [5.0, 0.0], [0.0, 5.0]], 40, 1.0, 13);
    let fit = |slots| {
        Em::new()
            .with_num_clusters(ClusterCount::Fixed(3))
            .with_execution_slots(slots)
            .fit(&data)
            .unwrap()
    };
    let one = fit(1);
    let four = fit(4);
    assert_eq!(one.assign_all(&data).unwrap(), four.assign_all(&data).unwrap());
    assert_relative_eq!(one.log_likelihood(), four.log_likelihood(), epsilon = 1e-6);
    for (a, b) in one.priors().iter().zip(four.priors()) {
        assert_relative_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn log_likelihood_only_drops_on_the_last_step() {
    let (data, _) = blobs(&[[0.0, 0.0], [3.0, 3.0], [6.0, 0.0]], 30, 1.5, 21);
    let model = Em::new()
        .with_num_clusters(ClusterCount::Fixed(4))
        .fit(&data)
        .unwrap();
    let trace = model.log_likelihood_trace();
    for w in trace[..trace.len() - 1].windows(2) {
        assert!(w[1] >= w[0], "{trace:?}");
    }
    // The reported value never falls below the best seen
    let best = trace.iter().cloned().fold(f64::MIN, f64::max);
    assert!(model.log_likelihood() >= best - 1e-6);
}

#[test]
fn density_api_is_consistent() {
    let (data, _) = blobs(&[[0.0, 0.0], [10.0, 10.0]], 20, 1.0, 4);
    let model = Em::new()
        .with_num_clusters(ClusterCount::Fixed(2))
        .fit(&data)
        .unwrap();
    let r = Record::from_numeric(&[0.5, -0.2]);
    let per_cluster = model.log_density_per_cluster(&r).unwrap();
    let joint = model.log_joint_densities(&r).unwrap();
    for c in 0..2 {
        assert_relative_eq!(joint[c], per_cluster[c] + model.priors()[c].ln(), epsilon = 1e-12);
    }
    let total = joint.iter().map(|j| j.exp()).sum::<f64>().ln();
    assert_relative_eq!(model.log_density(&r).unwrap(), total, epsilon = 1e-9);

    let membership = model.membership(&r).unwrap();
    assert_relative_eq!(membership.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    assert_eq!(
        model.assign(&r).unwrap(),
        if membership[0] > membership[1] { 0 } else { 1 }
    );
}

#[test]
fn missing_values_are_imputed() {
    let schema = Schema::new(vec![Attribute::numeric("x"), Attribute::nominal("c", ["lo", "hi"])]);
    let mut records = Vec::new();
    for i in 0..12 {
        let x = if i < 6 { i as f64 * 0.1 } else { 10.0 + i as f64 * 0.1 };
        let c = Value::Nominal(usize::from(i >= 6));
        records.push(Record::new(vec![x_or_missing(i, x), c]));
    }
    let data = Dataset::new(schema, records).unwrap();
    let model = Em::new()
        .with_num_clusters(ClusterCount::Fixed(2))
        .fit(&data)
        .unwrap();
    assert_eq!(model.cluster_count(), 2);
    let m = model
        .membership(&Record::new(vec![Value::Missing, Value::Nominal(0)]))
        .unwrap();
    assert_relative_eq!(m.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
}

fn x_or_missing(i: usize, x: f64) -> Value {
    if i == 3 {
        Value::Missing
    } else {
        Value::Numeric(x)
    }
}

#[test]
fn describe_is_stable() {
    let (data, _) = blobs(&[[0.0, 0.0], [10.0, 10.0]], 20, 1.0, 6);
    let model = Em::new()
        .with_num_clusters(ClusterCount::Fixed(2))
        .fit(&data)
        .unwrap();
    assert_eq!(model.describe(), model.describe());
    assert_eq!(model.describe().to_string(), model.describe().to_string());
    let json = serde_json::to_value(model.describe()).unwrap();
    assert_eq!(json["priors"].as_array().unwrap().len(), 2);
}

#[test]
fn config_drives_either_engine() {
    let (data, truth) = blobs(&[[0.0, 0.0], [10.0, 10.0]], 30, 1.0, 17);
    for algorithm in [Algorithm::Em, Algorithm::KMeans] {
        let config = ClusteringConfig::new()
            .with_algorithm(algorithm)
            .with_num_clusters(ClusterCount::Fixed(2));
        let model = fit(&data, &config).unwrap();
        let labels = model.assign_all(&data).unwrap();
        assert_relative_eq!(adjusted_rand_index(&labels, &truth), 1.0);
        assert!(!model.describe().to_string().is_empty());
    }
}

#[test]
fn empty_input_rejected() {
    let data = Dataset::new(Schema::numeric(2), Vec::new()).unwrap();
    assert!(matches!(Em::new().fit(&data), Err(partita::Error::EmptyInput)));
}
