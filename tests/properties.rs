use partita::{
    adjusted_rand_index, purity, CanopyConfig, ClusterCount, ClusterModel, Clusterer, Dataset, DistanceMetric, Em,
    InitMethod, Kmeans,
};
use proptest::prelude::*;

fn points() -> impl Strategy<Value = Vec<Vec<f64>>> {
    proptest::collection::vec(proptest::collection::vec(-100.0f64..100.0, 2), 1..40)
}

fn init_method() -> impl Strategy<Value = InitMethod> {
    prop_oneof![
        Just(InitMethod::Random),
        Just(InitMethod::KMeansPlusPlus),
        Just(InitMethod::FarthestFirst),
        Just(InitMethod::Canopy),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn kmeans_partitions_every_record(
        rows in points(),
        k in 1usize..6,
        init in init_method(),
        manhattan in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let data = Dataset::from_rows(&rows).unwrap();
        let metric = if manhattan { DistanceMetric::Manhattan } else { DistanceMetric::Euclidean };
        let model = Kmeans::new(k)
            .with_init(init)
            .with_metric(metric)
            .with_seed(seed)
            .with_preserve_order(true)
            .fit(&data)
            .unwrap();

        prop_assert!(model.cluster_count() >= 1);
        prop_assert!(model.cluster_count() <= k.min(rows.len()));
        let labels = model.assignments().unwrap();
        prop_assert_eq!(labels.len(), rows.len());
        prop_assert!(labels.iter().all(|&l| l < model.cluster_count()));
        let total: f64 = model.cluster_sizes().iter().sum();
        prop_assert!((total - rows.len() as f64).abs() < 1e-9);
        prop_assert!(model.squared_error() >= 0.0);
    }

    #[test]
    fn kmeans_is_deterministic(rows in points(), k in 1usize..5, seed in any::<u64>()) {
        let data = Dataset::from_rows(&rows).unwrap();
        let fit = || Kmeans::new(k).with_seed(seed).with_preserve_order(true).fit(&data).unwrap();
        let a = fit();
        let b = fit();
        prop_assert_eq!(a.assignments(), b.assignments());
        prop_assert_eq!(a.centroids(), b.centroids());
    }

    #[test]
    fn canopy_pruning_matches_full_search(
        rows in points(),
        k in 1usize..6,
        manhattan in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let data = Dataset::from_rows(&rows).unwrap();
        let metric = if manhattan { DistanceMetric::Manhattan } else { DistanceMetric::Euclidean };
        let fit = |enabled| {
            Kmeans::new(k)
                .with_metric(metric)
                .with_seed(seed)
                .with_canopy(CanopyConfig::default().with_enabled(enabled))
                .with_preserve_order(true)
                .fit(&data)
                .unwrap()
        };
        let plain = fit(false);
        let pruned = fit(true);
        prop_assert_eq!(plain.assignments(), pruned.assignments());
        prop_assert_eq!(plain.centroids(), pruned.centroids());
        prop_assert_eq!(plain.iterations(), pruned.iterations());
    }

    #[test]
    fn agreement_ignores_label_names(labels in proptest::collection::vec(0usize..4, 1..50)) {
        let renamed: Vec<usize> = labels.iter().map(|l| 3 - l).collect();
        prop_assert!((adjusted_rand_index(&labels, &renamed) - 1.0).abs() < 1e-9);
        prop_assert!((purity(&labels, &renamed) - 1.0).abs() < 1e-12);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn em_membership_is_a_distribution(rows in points(), k in 1usize..4) {
        let data = Dataset::from_rows(&rows).unwrap();
        let model = Em::new()
            .with_num_clusters(ClusterCount::Fixed(k))
            .with_kmeans_runs(2)
            .fit(&data)
            .unwrap();

        prop_assert!(model.cluster_count() >= 1);
        prop_assert!(model.cluster_count() <= k);
        prop_assert!((model.priors().iter().sum::<f64>() - 1.0).abs() < 1e-9);
        for r in data.records() {
            let m = model.membership(r).unwrap();
            prop_assert!((m.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            prop_assert!(m.iter().all(|p| (0.0..=1.0 + 1e-12).contains(p)));
            prop_assert!(model.log_density(r).unwrap().is_finite());
        }
    }
}
