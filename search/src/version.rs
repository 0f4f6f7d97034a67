use std::cmp::Ordering;

/// Compare dotted version strings component by component.
///
/// Missing components count as `0` and non-numeric ones parse as `0`. When
/// `parts` is set only that many leading components are compared.
pub fn compare_versions(a: &str, b: &str, parts: Option<usize>) -> Ordering {
    let a = components(a);
    let b = components(b);
    let len = a.len().max(b.len());
    let len = parts.map_or(len, |parts| parts.min(len));

    for idx in 0..len {
        let left = a.get(idx).copied().unwrap_or(0);
        let right = b.get(idx).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}
