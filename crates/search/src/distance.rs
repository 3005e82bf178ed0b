//! Bounded edit distance for fuzzy matching
//!
//! Optimal string alignment (restricted Damerau-Levenshtein): insertions,
//! deletions, substitutions and adjacent transpositions each cost 1, and no
//! substring is edited twice. The computation stops as soon as every cell of
//! a DP row exceeds the bound.

/// OSA distance between `a` and `b`, or `None` when it exceeds `max`.
pub fn bounded_osa<T: PartialEq>(a: &[T], b: &[T], max: usize) -> Option<usize> {
    let (n, m) = (a.len(), b.len());
    if n.abs_diff(m) > max {
        return None;
    }
    if n == 0 || m == 0 {
        return Some(n.max(m));
    }

    let mut prev2 = vec![0usize; m + 1];
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut cur = vec![0usize; m + 1];

    for i in 1..=n {
        cur[0] = i;
        let mut row_min = i;
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut value = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                value = value.min(prev2[j - 2] + 1);
            }
            cur[j] = value;
            row_min = row_min.min(value);
        }
        // A transposition two rows down costs at least one more than some
        // cell of this row, so the whole remainder is above the bound too.
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut cur);
    }

    let distance = prev[m];
    (distance <= max).then_some(distance)
}

/// [`bounded_osa`] over the characters of two strings.
///
/// ASCII inputs are compared byte-wise without allocating char buffers.
pub fn str_distance(a: &str, b: &str, max: usize) -> Option<usize> {
    if a.is_ascii() && b.is_ascii() {
        return bounded_osa(a.as_bytes(), b.as_bytes(), max);
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    bounded_osa(&a, &b, max)
}
