//! String similarity measures used by retrieval.

use std::collections::{HashMap, HashSet};

/// Ratcliff/Obershelp similarity: `2 * M / (|a| + |b|)`.
///
/// `M` is the number of characters in the matching blocks found by taking
/// the longest common substring and recursing on both sides of it. Ties go
/// to the block that ends earliest in `a`, then starts earliest in `b`.
/// Operates on chars, not bytes. Two empty strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Cheap upper bound on [`sequence_ratio`] from lengths alone.
pub fn ratio_upper_bound(a: &str, b: &str) -> f64 {
    let la = a.chars().count();
    let lb = b.chars().count();
    if la + lb == 0 {
        return 1.0;
    }
    2.0 * la.min(lb) as f64 / (la + lb) as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        positions.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, &positions, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`.
fn longest_match(
    a: &[char],
    positions: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    // run length of the match ending at (i - 1, j), keyed by j
    let mut prev: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(js) = positions.get(c) {
            for &j in js {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let run = if j > 0 {
                    prev.get(&(j - 1)).copied().unwrap_or(0) + 1
                } else {
                    1
                };
                next.insert(j, run);
                if run > best_len {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_len = run;
                }
            }
        }
        prev = next;
    }
    (best_i, best_j, best_len)
}

/// Jaccard overlap of whitespace tokens, 0.0 when both sides are empty.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a: HashSet<&str> = a.split_whitespace().collect();
    let b: HashSet<&str> = b.split_whitespace().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}
