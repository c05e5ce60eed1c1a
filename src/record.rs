//! Nested record tree built from dot-path headers.
//!
//! A header such as `name.firstName` places its value at `record["name"]["firstName"]`.
//! Headers sharing a prefix merge under one branch. Branches keep keys in the
//! order they were first assigned, which is header order.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Leaf key whose value is coerced to an integer.
pub const AGE_KEY: &str = "age";

/// Scalar leaf value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Text(String),
    Int(i64),
}

/// A record tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Scalar),
    Branch(Fields),
}

/// Insertion-ordered key to node mapping.
///
/// Rows carry a handful of columns, so lookups are a linear scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, Node)>,
}

/// One reconstructed row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    root: Fields,
}

impl Node {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Leaf(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Node::Leaf(Scalar::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&Fields> {
        match self {
            Node::Branch(fields) => Some(fields),
            Node::Leaf(_) => None,
        }
    }

    /// Turn this node into an empty branch unless it already is one.
    fn make_branch(&mut self) -> &mut Fields {
        if !matches!(self, Node::Branch(_)) {
            *self = Node::Branch(Fields::default());
        }
        match self {
            Node::Branch(fields) => fields,
            Node::Leaf(_) => unreachable!("node was just replaced by a branch"),
        }
    }
}

impl Fields {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: &str, node: Node) {
        match self.position(key) {
            Some(idx) => self.entries[idx].1 = node,
            None => self.entries.push((key.to_string(), node)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let idx = self.position(key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Branch under `key`, created (or overwriting a leaf) when needed.
    fn branch_mut(&mut self, key: &str) -> &mut Fields {
        let idx = match self.position(key) {
            Some(idx) => idx,
            None => {
                self.entries
                    .push((key.to_string(), Node::Branch(Fields::default())));
                self.entries.len() - 1
            }
        };
        self.entries[idx].1.make_branch()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &Fields {
        &self.root
    }

    pub fn into_fields(self) -> Fields {
        self.root
    }

    /// Place `value` at the dot-separated `path`.
    ///
    /// Intermediate keys become branches, replacing any leaf found on the way.
    /// A final key named `age` stores an integer (see [`parse_int_prefix`]);
    /// every other key stores the raw text.
    pub fn assign(&mut self, path: &str, value: &str) {
        let mut keys = path.split('.');
        // split always yields at least one item
        let mut last = keys.next().unwrap_or_default();
        let mut node = &mut self.root;
        for key in keys {
            node = node.branch_mut(last);
            last = key;
        }
        let leaf = if last == AGE_KEY {
            Scalar::Int(parse_int_prefix(value))
        } else {
            Scalar::Text(value.to_string())
        };
        node.insert(last, Node::Leaf(leaf));
    }

    /// Node at a dot-separated path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut keys = path.split('.');
        let mut node = self.root.get(keys.next()?)?;
        for key in keys {
            node = node.as_fields()?.get(key)?;
        }
        Some(node)
    }

    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Node::as_text)
    }

    pub fn int(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Node::as_int)
    }

    /// Detach a top-level key.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        self.root.remove(key)
    }
}

/// Leading-integer parse: optional whitespace and sign, then ASCII digits.
///
/// Anything without leading digits, or out of `i64` range, is `0`.
pub fn parse_int_prefix(value: &str) -> i64 {
    let s = value.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => ("-", &s[1..]),
        Some(b'+') => ("", &s[1..]),
        _ => ("", s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return 0;
    }
    format!("{sign}{}", &rest[..digits]).parse().unwrap_or(0)
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Int(n) => serializer.serialize_i64(*n),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Leaf(scalar) => scalar.serialize(serializer),
            Node::Branch(fields) => fields.serialize(serializer),
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(pairs: &[(&str, &str)]) -> Record {
        let mut record = Record::new();
        for (path, value) in pairs {
            record.assign(path, value);
        }
        record
    }

    #[test]
    fn shared_prefixes_merge_into_one_branch() {
        let record = build(&[
            ("name.firstName", "John"),
            ("name.lastName", "Doe"),
            ("age", "30"),
        ]);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"name": {"firstName": "John", "lastName": "Doe"}, "age": 30})
        );
        assert_eq!(record.int("age"), Some(30));
        assert_eq!(record.text("name.lastName"), Some("Doe"));
    }

    #[test]
    fn age_coercion_is_best_effort() {
        assert_eq!(build(&[("age", "abc")]).int("age"), Some(0));
        assert_eq!(build(&[("age", "")]).int("age"), Some(0));
        assert_eq!(build(&[("age", " 42years")]).int("age"), Some(42));
        assert_eq!(build(&[("age", "-7")]).int("age"), Some(-7));
        assert_eq!(build(&[("age", "3.9")]).int("age"), Some(3));
        assert_eq!(build(&[("age", "99999999999999999999")]).int("age"), Some(0));
    }

    #[test]
    fn nested_age_key_is_also_coerced() {
        let record = build(&[("child.age", "12"), ("child.ageGroup", "12")]);
        assert_eq!(record.int("child.age"), Some(12));
        assert_eq!(record.text("child.ageGroup"), Some("12"));
    }

    #[test]
    fn leaf_is_overwritten_by_deeper_path() {
        let record = build(&[("address", "n/a"), ("address.city", "Pune")]);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"address": {"city": "Pune"}})
        );
    }

    #[test]
    fn deeper_path_then_leaf_replaces_branch() {
        let record = build(&[("a.b.c", "1"), ("a.b", "2")]);
        assert_eq!(record.text("a.b"), Some("2"));
        assert!(record.get("a.b.c").is_none());
    }

    #[test]
    fn key_order_follows_first_assignment() {
        let record = build(&[("z", "1"), ("a.x", "2"), ("m", "3"), ("a.y", "4")]);
        let keys: Vec<_> = record.fields().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"z":"1","a":{"x":"2","y":"4"},"m":"3"}"#
        );
    }

    #[test]
    fn remove_detaches_top_level_key() {
        let mut record = build(&[("name.firstName", "A"), ("gender", "f")]);
        assert!(record.remove("name").is_some());
        assert!(record.remove("name").is_none());
        assert_eq!(record.fields().len(), 1);
    }
}
