/// All subsets of `items`, smallest first.
///
/// Subsets of equal size keep the input order, duplicates in `items` are
/// ignored. The power set of an empty input is `[[]]`.
pub fn power_set<T: Clone + PartialEq>(items: &[T]) -> Vec<Vec<T>> {
    let mut unique: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }

    let mut subsets = Vec::new();
    for size in 0..=unique.len() {
        subsets.extend(combinations(&unique, size));
    }
    subsets
}

/// All `size`-element subsets of `items` in lexicographic index order.
pub fn combinations<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if size > n {
        return Vec::new();
    }

    let mut result = Vec::new();
    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        result.push(indices.iter().map(|&i| items[i].clone()).collect());

        // Find the rightmost index that can still move right.
        let mut pos = size;
        while pos > 0 && indices[pos - 1] == pos - 1 + n - size {
            pos -= 1;
        }
        if pos == 0 {
            return result;
        }
        indices[pos - 1] += 1;
        for i in pos..size {
            indices[i] = indices[i - 1] + 1;
        }
    }
}
