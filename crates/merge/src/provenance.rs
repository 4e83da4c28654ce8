// Provenance labels for merged sources

use std::collections::HashSet;
use std::path::Path;

/// Label for one table read from `file_name`.
///
/// The label is the file stem. A workbook that produced more than one table
/// gets `{stem}_sheet{ordinal}` so its sheets stay distinguishable.
pub fn source_label(file_name: &str, ordinal: usize, table_count: usize) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    if table_count > 1 {
        format!("{stem}_sheet{ordinal}")
    } else {
        stem.to_string()
    }
}

/// Make labels unique while keeping their order.
///
/// The first occurrence keeps its label; later repeats get `_{n}` with the
/// smallest `n >= 2` that clashes with no label in the request.
pub fn resolve_labels(raw: &[String]) -> Vec<String> {
    let reserved: HashSet<&str> = raw.iter().map(String::as_str).collect();
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut resolved = Vec::with_capacity(raw.len());

    for label in raw {
        let mut candidate = label.clone();
        if used.contains(&candidate) {
            let mut n = 2;
            loop {
                candidate = format!("{label}_{n}");
                if !used.contains(&candidate) && !reserved.contains(candidate.as_str()) {
                    break;
                }
                n += 1;
            }
        }
        used.insert(candidate.clone());
        resolved.push(candidate);
    }
    resolved
}
