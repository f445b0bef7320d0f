use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::warn;

/// Reserved key holding prose that is not attached to any key.
pub const CONTENT_KEY: &str = "_content";

/// One entry of a [`KeyValueDocument`].
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// A section or subsection with its own entries
    Section(KeyValueDocument),
    /// A key's value; `None` when the key had no value
    Value(Option<String>),
    /// Free prose collected under `_content`
    Content(Vec<String>),
}

impl Node {
    pub fn value(text: &str) -> Self {
        Node::Value(Some(text.to_owned()))
    }

    pub fn as_section(&self) -> Option<&KeyValueDocument> {
        match self {
            Node::Section(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&str> {
        match self {
            Node::Value(value) => value.as_deref(),
            _ => None,
        }
    }
}

/// Nested key/value mapping that keeps first-seen order at every level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyValueDocument {
    entries: Vec<(String, Node)>,
}

impl KeyValueDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[(String, Node)] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(name, _)| name == key).map(|(_, node)| node)
    }

    /// Follows a path of section names.
    pub fn section(&self, path: &[&str]) -> Option<&KeyValueDocument> {
        path.iter().try_fold(self, |document, name| document.get(name)?.as_section())
    }

    /// Sets `key`, replacing an existing entry in place.
    ///
    /// A later value for a key that names a section replaces the whole
    /// section, so its nested entries are dropped.
    pub fn insert(&mut self, key: &str, node: Node) {
        match self.entries.iter_mut().find(|(name, _)| name == key) {
            Some((_, existing)) => {
                if let Node::Section(section) = existing {
                    if !matches!(node, Node::Section(_)) {
                        warn!("Value for '{key}' replaces a section with {} entries", section.total_keys());
                    }
                }
                *existing = node;
            }
            None => self.entries.push((key.to_owned(), node)),
        }
    }

    /// Returns the named section, creating it or turning a plain entry into it.
    pub fn section_mut(&mut self, name: &str) -> &mut KeyValueDocument {
        let index = match self.entries.iter().position(|(key, _)| key == name) {
            Some(index) => index,
            None => {
                self.entries.push((name.to_owned(), Node::Section(KeyValueDocument::new())));
                self.entries.len() - 1
            }
        };
        let node = &mut self.entries[index].1;
        if !matches!(node, Node::Section(_)) {
            *node = Node::Section(KeyValueDocument::new());
        }
        match node {
            Node::Section(document) => document,
            _ => unreachable!("entry was just made a section"),
        }
    }

    /// Descends through `path`, creating missing sections on the way.
    pub fn level_mut(&mut self, path: &[String]) -> &mut KeyValueDocument {
        path.iter().fold(self, |document, name| document.section_mut(name))
    }

    /// Appends a paragraph to this level's `_content` list.
    pub fn push_content(&mut self, paragraph: String) {
        match self.entries.iter_mut().find(|(name, _)| name == CONTENT_KEY) {
            Some((_, Node::Content(paragraphs))) => paragraphs.push(paragraph),
            Some((_, node)) => *node = Node::Content(vec![paragraph]),
            None => self.entries.push((CONTENT_KEY.to_owned(), Node::Content(vec![paragraph]))),
        }
    }

    /// Counts keys at every depth, `_content` included.
    pub fn total_keys(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| 1 + node.as_section().map_or(0, KeyValueDocument::total_keys))
            .sum()
    }

    /// Number of levels in the longest key chain; 0 for an empty document.
    pub fn max_depth(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| 1 + node.as_section().map_or(0, KeyValueDocument::max_depth))
            .max()
            .unwrap_or(0)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Section(document) => document.serialize(serializer),
            Node::Value(Some(value)) => serializer.serialize_str(value),
            Node::Value(None) => serializer.serialize_none(),
            Node::Content(paragraphs) => {
                let mut seq = serializer.serialize_seq(Some(paragraphs.len()))?;
                for paragraph in paragraphs {
                    seq.serialize_element(paragraph)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for KeyValueDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}
