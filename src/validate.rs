use crate::record::{Node, Record};

/// Dot-paths every record is expected to carry.
pub const MANDATORY_FIELDS: [&str; 3] = ["name.firstName", "name.lastName", "age"];

/// Mandatory paths that are absent or empty on `record`.
///
/// Name parts must be non-empty text. `age` only has to exist; the builder
/// always stores an integer there, so `0` counts as present.
pub fn missing_mandatory(record: &Record) -> Vec<&'static str> {
    MANDATORY_FIELDS
        .iter()
        .copied()
        .filter(|path| !is_present(record, path))
        .collect()
}

fn is_present(record: &Record, path: &str) -> bool {
    match record.get(path) {
        Some(Node::Leaf(_)) if path == "age" => true,
        Some(node) => node.as_text().is_some_and(|s| !s.is_empty()),
        None => false,
    }
}
