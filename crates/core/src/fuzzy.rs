//! Order-insensitive fuzzy similarity on a 0..=100 scale.
//!
//! `token_set_ratio` compares the shared and the differing word sets of two
//! strings, so `"oak board"` and `"board oak"` score 100 and `"oaks"` still
//! lands close to `"oak"`.

use std::collections::BTreeSet;

/// Normalized indel similarity: `200 * lcs / (len_a + len_b)`.
pub fn ratio(left: &str, right: &str) -> f64 {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    let total = left.len() + right.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(&left, &right) as f64 / total as f64
}

pub fn token_set_ratio(left: &str, right: &str) -> f64 {
    let left = left.to_lowercase();
    let right = right.to_lowercase();
    let left_words: BTreeSet<&str> = left.split_whitespace().collect();
    let right_words: BTreeSet<&str> = right.split_whitespace().collect();

    if left_words.is_empty() || right_words.is_empty() {
        return 0.0;
    }

    let shared: Vec<&str> = left_words.intersection(&right_words).copied().collect();
    let only_left: Vec<&str> = left_words.difference(&right_words).copied().collect();
    let only_right: Vec<&str> = right_words.difference(&left_words).copied().collect();

    if !shared.is_empty() && (only_left.is_empty() || only_right.is_empty()) {
        return 100.0;
    }

    let shared = shared.join(" ");
    let only_left = only_left.join(" ");
    let only_right = only_right.join(" ");

    if shared.is_empty() {
        return ratio(&only_left, &only_right);
    }

    let with_left = format!("{shared} {only_left}");
    let with_right = format!("{shared} {only_right}");
    ratio(&with_left, &with_right)
        .max(ratio(&shared, &with_left))
        .max(ratio(&shared, &with_right))
}

/// Length of the longest common subsequence, two-row dynamic programming.
fn lcs_len(left: &[char], right: &[char]) -> usize {
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let mut previous = vec![0usize; right.len() + 1];
    let mut current = vec![0usize; right.len() + 1];

    for &a in left {
        for (j, &b) in right.iter().enumerate() {
            current[j + 1] = if a == b {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}
