//! Tests for the correlation explorer

use harvest::pipeline::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn cleaned_features(rows: usize, seed: u64) -> (FeatureMatrix, Vec<String>, Vec<usize>) {
    let (train, eval) = create_har_tables(rows, 5, seed);
    let cleaned = clean_tables(&train, &eval, &AnalysisConfig::default()).unwrap();
    let features = cleaned.training_features().unwrap();
    (features, cleaned.feature_names, cleaned.labels)
}

#[test]
fn test_matrix_is_symmetric_with_unit_diagonal() {
    let (features, names, _) = cleaned_features(300, 1);
    let matrix = correlation_matrix(&features, &names).unwrap();

    assert_eq!(matrix.size(), SENSOR_COLUMNS.len());
    assert!(matrix.skipped_constant.is_empty());
    for i in 0..matrix.size() {
        assert_eq!(matrix.get(i, i), 1.0);
        for j in 0..matrix.size() {
            assert_eq!(matrix.get(i, j), matrix.get(j, i));
            assert!(matrix.get(i, j).abs() <= 1.0);
        }
    }
}

#[test]
fn test_matrix_matches_pairwise_pearson() {
    let rows: Vec<Vec<f64>> = vec![
        vec![1.0, 2.0, 5.0],
        vec![2.0, 4.1, 1.0],
        vec![3.0, 6.2, 8.0],
        vec![4.0, 7.9, 2.0],
        vec![5.0, 10.0, 9.0],
        vec![6.0, 12.1, 0.0],
    ];
    let features = FeatureMatrix::from_rows(&rows).unwrap();
    let names = vec!["a".to_string(), "b".to_string(), "d".to_string()];
    let matrix = correlation_matrix(&features, &names).unwrap();

    // Reference Pearson coefficient computed directly
    let x: Vec<f64> = rows.iter().map(|r| r[0]).collect();
    let y: Vec<f64> = rows.iter().map(|r| r[2]).collect();
    let mx = x.iter().sum::<f64>() / 6.0;
    let my = y.iter().sum::<f64>() / 6.0;
    let cov: f64 = x.iter().zip(&y).map(|(a, b)| (a - mx) * (b - my)).sum();
    let sx: f64 = x.iter().map(|a| (a - mx) * (a - mx)).sum::<f64>().sqrt();
    let sy: f64 = y.iter().map(|b| (b - my) * (b - my)).sum::<f64>().sqrt();
    let expected = cov / (sx * sy);

    assert!((matrix.between("a", "d").unwrap() - expected).abs() < 1e-9);
    assert!(matrix.between("a", "b").unwrap() > 0.99);
}

#[test]
fn test_constant_predictor_is_reported() {
    let rows: Vec<Vec<f64>> = (0..12).map(|i| vec![i as f64, 0.5, (i % 3) as f64]).collect();
    let features = FeatureMatrix::from_rows(&rows).unwrap();
    let names = vec!["a".to_string(), "flat".to_string(), "c".to_string()];
    let matrix = correlation_matrix(&features, &names).unwrap();

    assert_eq!(matrix.skipped_constant, vec!["flat".to_string()]);
    assert_eq!(matrix.names, vec!["a".to_string(), "c".to_string()]);
    assert!(matrix.between("flat", "a").is_none());
}

#[test]
fn test_label_ranking_sorted_by_magnitude() {
    let (features, names, labels) = cleaned_features(400, 2);
    let ranking = label_correlations(&features, &names, &labels).unwrap();

    assert_eq!(ranking.len(), SENSOR_COLUMNS.len());
    for pair in ranking.windows(2) {
        assert!(pair[0].correlation.abs() >= pair[1].correlation.abs());
    }
    // roll_belt and pitch_belt place the classes in (reverse) label order
    let top: Vec<&str> = ranking.iter().take(2).map(|r| r.feature.as_str()).collect();
    assert!(top.contains(&"roll_belt"));
    assert!(top.contains(&"pitch_belt"));
}

#[test]
fn test_label_ranking_length_mismatch() {
    let features = FeatureMatrix::zeros(4, 2);
    let names = vec!["a".to_string(), "b".to_string()];
    assert!(label_correlations(&features, &names, &[0, 1]).is_err());
}

#[test]
fn test_correlated_pairs_respect_threshold() {
    let (features, names, _) = cleaned_features(300, 3);
    let matrix = correlation_matrix(&features, &names).unwrap();

    let pairs = find_correlated_pairs(&matrix, 0.8);
    for pair in &pairs {
        assert!(pair.correlation.abs() > 0.8);
        assert_ne!(pair.feature1, pair.feature2);
    }
    // roll_belt and pitch_belt are mirror images of each other
    assert!(pairs.iter().any(|p| {
        (p.feature1 == "roll_belt" && p.feature2 == "pitch_belt") && p.correlation < -0.8
    }));

    assert!(find_correlated_pairs(&matrix, 1.0).is_empty());
}
