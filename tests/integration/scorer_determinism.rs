use kindred_server::scorer;

#[test]
fn test_same_text_same_vector() {
    let a = scorer::embed("help me debug python code");
    let b = scorer::embed("help me debug python code");
    // Bit-for-bit identical, regenerable on any run
    assert_eq!(a, b);
}

#[test]
fn test_vector_shape_and_norm() {
    let v = scorer::embed("I like hiking and guitar");
    assert_eq!(v.len(), scorer::EMBEDDING_DIM);
    let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4, "norm was {norm}");
}

#[test]
fn test_empty_text_is_zero_vector() {
    let v = scorer::embed("");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn test_cosine_of_identical_text_is_one() {
    let a = scorer::embed("rust programming and databases");
    let sim = scorer::cosine(&a, &a);
    assert!((sim - 1.0).abs() < 1e-9);
}

#[test]
fn test_cosine_orders_by_topical_overlap() {
    let prompt = scorer::embed("help me debug python code");
    let tech = scorer::embed("python debugging code");
    let mixed = scorer::embed("python cooking guitar hiking marketing books");
    let unrelated = scorer::embed("cooking baking");

    let s_tech = scorer::cosine(&prompt, &tech);
    let s_mixed = scorer::cosine(&prompt, &mixed);
    let s_unrelated = scorer::cosine(&prompt, &unrelated);
    assert!(s_tech > s_mixed, "{s_tech} vs {s_mixed}");
    assert!(s_mixed > s_unrelated, "{s_mixed} vs {s_unrelated}");
}

#[test]
fn test_cosine_degenerate_inputs() {
    let a = scorer::embed("music");
    assert_eq!(scorer::cosine(&a, &[]), 0.0);
    assert_eq!(scorer::cosine(&[], &[]), 0.0);
    let zeros = vec![0f32; scorer::EMBEDDING_DIM];
    assert_eq!(scorer::cosine(&a, &zeros), 0.0);
}

#[test]
fn test_jaccard() {
    let a: Vec<String> = ["music", "travel"].iter().map(|s| s.to_string()).collect();
    let b: Vec<String> = ["travel", "books"].iter().map(|s| s.to_string()).collect();
    let sim = scorer::jaccard(&a, &b);
    assert!((sim - 1.0 / 3.0).abs() < 1e-9);

    assert_eq!(scorer::jaccard(&a, &a), 1.0);
    assert_eq!(scorer::jaccard(&a, &[]), 0.0);
    assert_eq!(scorer::jaccard(&[], &[]), 0.0);
}

#[test]
fn test_haversine_known_distance() {
    // Paris to London is roughly 344 km
    let d = scorer::haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
    assert!((330.0..360.0).contains(&d), "distance was {d}");
    assert_eq!(scorer::haversine_km(10.0, 20.0, 10.0, 20.0), 0.0);
}

#[test]
fn test_location_score() {
    // Both hidden: neutral 1.0
    assert_eq!(scorer::location_score(None, None, 25.0), 1.0);
    // One hidden: midpoint
    assert_eq!(scorer::location_score(Some((1.0, 1.0)), None, 25.0), 0.5);
    // Same point: full score
    let same = scorer::location_score(Some((48.85, 2.35)), Some((48.85, 2.35)), 25.0);
    assert!((same - 1.0).abs() < 1e-9);
    // Far outside the radius: floored at zero
    let far = scorer::location_score(Some((48.85, 2.35)), Some((51.5, -0.12)), 25.0);
    assert_eq!(far, 0.0);
}
