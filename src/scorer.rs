//! Deterministic text scoring: the embedding used to rank givers against
//! help prompts, plus the pure geometry and set-overlap functions the
//! matchmaking pass scores with. Everything here is reproducible — the same
//! text yields the same vector on every run and every machine.

pub const EMBEDDING_DIM: usize = 1536;
const CATEGORY_DIMS: usize = 192;
const TAIL_DIMS: usize = 64;

/// Keyword categories, one block of dimensions each. Keyword weight is
/// `count × length/10`, so longer, rarer words move the vector more than
/// stop-word-ish short ones.
const CATEGORIES: [&[&str]; 8] = [
    // technology
    &[
        "code", "coding", "programming", "software", "computer", "python", "rust", "javascript",
        "debug", "debugging", "api", "database", "server", "linux", "app", "tech", "ai", "data",
    ],
    // creative
    &[
        "art", "design", "drawing", "painting", "music", "guitar", "piano", "singing", "writing",
        "poetry", "photography", "film", "craft", "creative", "dance", "dancing",
    ],
    // social
    &[
        "friends", "party", "talking", "listening", "advice", "relationship", "dating", "family",
        "community", "volunteer", "mentoring", "coaching", "support", "empathy",
    ],
    // wellness
    &[
        "fitness", "gym", "yoga", "meditation", "running", "health", "nutrition", "diet",
        "wellness", "mindfulness", "therapy", "sleep", "workout",
    ],
    // outdoors
    &[
        "hiking", "camping", "travel", "traveling", "nature", "climbing", "surfing", "skiing",
        "cycling", "fishing", "beach", "mountains", "adventure", "outdoors",
    ],
    // learning
    &[
        "books", "reading", "study", "studying", "math", "science", "history", "language",
        "languages", "learning", "teaching", "school", "university", "research", "philosophy",
    ],
    // business
    &[
        "startup", "business", "marketing", "finance", "investing", "money", "career", "resume",
        "interview", "sales", "entrepreneur", "management", "taxes", "legal",
    ],
    // everyday help
    &[
        "cooking", "baking", "moving", "repair", "fixing", "cleaning", "gardening", "driving",
        "shopping", "errands", "pets", "babysitting", "diy", "furniture",
    ],
];

/// Embed a text into the fixed 1536-dim space: eight 192-dim keyword-category
/// blocks laid end to end, with the final 64 dims overwritten by a textual
/// statistics tail, then L2-normalized.
pub fn embed(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v = vec![0f32; EMBEDDING_DIM];

    for (block, keywords) in CATEGORIES.iter().enumerate() {
        let score: f64 = keywords
            .iter()
            .map(|kw| lower.matches(kw).count() as f64 * kw.len() as f64 / 10.0)
            .sum();
        if score == 0.0 {
            continue;
        }
        let base = block * CATEGORY_DIMS;
        for i in 0..CATEGORY_DIMS {
            let phase = (i as f64 + 1.0) * std::f64::consts::PI / CATEGORY_DIMS as f64;
            v[base + i] = (score * phase.sin()) as f32;
        }
    }

    // Textual-statistics tail: length, word count, type-token ratio.
    let words: Vec<&str> = lower.split_whitespace().collect();
    let word_count = words.len();
    let distinct = {
        let mut seen = std::collections::HashSet::new();
        words.iter().filter(|w| seen.insert(*w)).count()
    };
    let ttr = if word_count > 0 {
        distinct as f64 / word_count as f64
    } else {
        0.0
    };
    let stats = [
        (lower.chars().count() as f64 / 100.0).min(10.0),
        (word_count as f64 / 20.0).min(10.0),
        ttr,
    ];
    let tail_base = EMBEDDING_DIM - TAIL_DIMS;
    for i in 0..TAIL_DIMS {
        let phase = (i as f64 + 1.0) * std::f64::consts::PI / TAIL_DIMS as f64;
        v[tail_base + i] = (stats[i % stats.len()] * phase.sin()) as f32;
    }

    l2_normalize(&mut v);
    v
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f64 = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x = (*x as f64 / norm) as f32;
        }
    }
}

/// Cosine similarity; the scorer's sole similarity function. Zero when
/// either vector is empty or all-zero.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0f64;
    let mut na = 0f64;
    let mut nb = 0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        na += *x as f64 * *x as f64;
        nb += *y as f64 * *y as f64;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Jaccard overlap of two string sets (already unioned with needs by the
/// caller where that applies). 0 when both are empty.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;
    let sa: HashSet<&str> = a.iter().map(String::as_str).collect();
    let sb: HashSet<&str> = b.iter().map(String::as_str).collect();
    if sa.is_empty() && sb.is_empty() {
        return 0.0;
    }
    let inter = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    inter / union
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// Location term of the match score: 1.0 when neither side has coordinates,
/// otherwise distance decayed linearly to zero at the preference radius.
pub fn location_score(
    a: Option<(f64, f64)>,
    b: Option<(f64, f64)>,
    radius_km: f64,
) -> f64 {
    match (a, b) {
        (Some((lat1, lon1)), Some((lat2, lon2))) => {
            let d = haversine_km(lat1, lon1, lat2, lon2);
            (1.0 - d / radius_km).max(0.0)
        }
        (None, None) => 1.0,
        // One side without coordinates scores the midpoint
        _ => 0.5,
    }
}
