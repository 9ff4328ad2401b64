use std::fmt;
use std::ops::Range;

use tree_sitter::Node;

use super::tree::{JsonDocument, decode_string, entries};

/// One step of a structural path into a JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Path from the root to a node. Displays as segments joined by `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPath(pub Vec<PathSegment>);

impl JsonPath {
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// A string literal found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    /// Byte span including the quotes
    pub span: Range<usize>,
    /// Unescaped value
    pub value: String,
    /// Literal as written
    pub raw: String,
    pub path: JsonPath,
}

/// Find the string literal whose containing pair or element covers
/// `offset` (bounds inclusive), descending into nested containers.
///
/// A caret on a pair's key resolves to that pair's value.
pub fn find_string_at(doc: &JsonDocument<'_>, offset: usize) -> Option<StringLiteral> {
    let mut node = doc.root()?;
    let mut path = Vec::new();
    loop {
        match node.kind() {
            "object" => {
                let pair = entries(node).into_iter().find(|pair| covers(pair, offset))?;
                path.push(PathSegment::Key(doc.pair_key(pair)?));
                node = pair.child_by_field_name("value")?;
            }
            "array" => {
                let (index, element) = entries(node)
                    .into_iter()
                    .enumerate()
                    .find(|(_, element)| covers(element, offset))?;
                path.push(PathSegment::Index(index));
                node = element;
            }
            "string" => {
                let raw = doc.raw(node);
                return Some(StringLiteral {
                    span: node.byte_range(),
                    value: decode_string(raw)?,
                    raw: raw.to_string(),
                    path: JsonPath(path),
                });
            }
            _ => return None,
        }
    }
}

fn covers(node: &Node<'_>, offset: usize) -> bool {
    node.start_byte() <= offset && offset <= node.end_byte()
}

/// Resolve a path against a freshly parsed document.
///
/// On objects a segment names a key (first match wins), on arrays an index.
/// A numeric key is accepted on an array and an index on an object is
/// looked up as its decimal key.
pub fn find_node_at_path<'t>(doc: &'t JsonDocument<'_>, path: &[PathSegment]) -> Option<Node<'t>> {
    path.iter().try_fold(doc.root()?, |node, segment| match node.kind() {
        "object" => {
            let key = segment.to_string();
            entries(node)
                .into_iter()
                .find(|pair| doc.pair_key(*pair).as_deref() == Some(key.as_str()))?
                .child_by_field_name("value")
        }
        "array" => {
            let index = match segment {
                PathSegment::Index(index) => *index,
                PathSegment::Key(key) => key.parse().ok()?,
            };
            entries(node).into_iter().nth(index)
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DOC: &str = r#"{"a": {"b": "x\ny"}, "list": ["p", "q"], "n": 1}"#;

    #[rstest]
    #[case::inside_literal(DOC.find("x\\n").unwrap(), Some("a/b"))]
    #[case::on_opening_quote(DOC.find("\"x").unwrap(), Some("a/b"))]
    #[case::on_key(DOC.find("\"b\"").unwrap(), Some("a/b"))]
    #[case::second_element(DOC.find("\"q\"").unwrap() + 1, Some("list/1"))]
    #[case::number(DOC.find('1').unwrap(), None)]
    #[case::between_properties(DOC.find(", \"list").unwrap() + 1, None)]
    fn string_lookup_by_offset(#[case] offset: usize, #[case] expected: Option<&str>) {
        let doc = JsonDocument::parse(DOC).unwrap();
        let found = find_string_at(&doc, offset).map(|s| s.path.to_string());
        assert_eq!(found.as_deref(), expected);
    }

    #[test]
    fn literal_keeps_raw_and_decoded_text() {
        let doc = JsonDocument::parse(DOC).unwrap();
        let literal = find_string_at(&doc, DOC.find("x\\n").unwrap()).unwrap();
        assert_eq!(literal.value, "x\ny");
        assert_eq!(literal.raw, r#""x\ny""#);
        assert_eq!(&DOC[literal.span.clone()], literal.raw);
    }

    #[test]
    fn root_string_has_empty_path() {
        let source = r#""top""#;
        let doc = JsonDocument::parse(source).unwrap();
        let literal = find_string_at(&doc, 2).unwrap();
        assert!(literal.path.is_root());
        assert_eq!(literal.path.to_string(), "");
    }

    #[rstest]
    #[case::nested(vec![PathSegment::Key("a".into()), PathSegment::Key("b".into())], Some("\"x\\ny\""))]
    #[case::index(vec![PathSegment::Key("list".into()), PathSegment::Index(0)], Some("\"p\""))]
    #[case::numeric_key_on_array(vec![PathSegment::Key("list".into()), PathSegment::Key("1".into())], Some("\"q\""))]
    #[case::missing_key(vec![PathSegment::Key("a".into()), PathSegment::Key("c".into())], None)]
    #[case::non_numeric_index(vec![PathSegment::Key("list".into()), PathSegment::Key("x".into())], None)]
    #[case::through_scalar(vec![PathSegment::Key("n".into()), PathSegment::Index(0)], None)]
    fn node_lookup_by_path(#[case] path: Vec<PathSegment>, #[case] expected: Option<&str>) {
        let doc = JsonDocument::parse(DOC).unwrap();
        let found = find_node_at_path(&doc, &path).map(|node| doc.raw(node));
        assert_eq!(found, expected);
    }
}
