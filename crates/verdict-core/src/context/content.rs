//! Content trees and selector paths.
//!
//! A request category may carry a content fragment (XML in the wire form;
//! here an already-parsed tree). Attribute selectors address nodes in that
//! tree with the conformance subset of XPath: `/`-separated element steps,
//! a `*` wildcard step, and a terminal `text()` or `@attribute`. Descendant
//! (`//`) steps are available only when enabled in the configuration.

use serde::{Deserialize, Serialize};

/// One element of a parsed content fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    /// Element name, including any namespace prefix verbatim.
    pub name: String,
    /// Attributes in document order.
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Concatenated text content of this element.
    #[serde(default)]
    pub text: String,
    /// Child elements in document order.
    #[serde(default)]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    /// A leaf element with text content.
    pub fn text_element(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self { name: name.into(), text: text.into(), ..Self::default() }
    }

    /// An element with children.
    pub fn element(name: impl Into<String>, children: Vec<ContentNode>) -> Self {
        Self { name: name.into(), children, ..Self::default() }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A step in a selector path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Match an element by name.
    Name(String),
    /// Match any element.
    Any,
}

impl Step {
    fn matches(&self, node: &ContentNode) -> bool {
        match self {
            Self::Name(name) => node.name == *name,
            Self::Any => true,
        }
    }
}

/// What the final matched nodes convert to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    /// The element's text content (also the default with no `text()`).
    Text,
    /// A named attribute of the element.
    Attribute(String),
}

/// A parsed selector path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    descendant: bool,
    steps: Vec<Step>,
    terminal: Terminal,
}

impl SelectorPath {
    /// Parses a selector path.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the path is empty, uses an
    /// unsupported construct, or uses `//` without `allow_descendant`.
    pub fn parse(path: &str, allow_descendant: bool) -> Result<Self, String> {
        let (descendant, body) = match path.strip_prefix("//") {
            Some(body) => (true, body),
            None => (false, path.strip_prefix('/').unwrap_or(path)),
        };
        if descendant && !allow_descendant {
            return Err("descendant ('//') steps are not enabled".to_string());
        }
        if body.is_empty() {
            return Err("empty path".to_string());
        }
        if body.contains("//") {
            return Err("interior '//' steps are not supported".to_string());
        }

        let mut steps = Vec::new();
        let mut terminal = Terminal::Text;
        let segments: Vec<&str> = body.split('/').collect();
        let last = segments.len() - 1;
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err("empty path step".to_string());
            }
            if index == last {
                if *segment == "text()" {
                    break;
                }
                if let Some(attr) = segment.strip_prefix('@') {
                    if attr.is_empty() {
                        return Err("empty attribute step".to_string());
                    }
                    terminal = Terminal::Attribute(attr.to_string());
                    break;
                }
            }
            if segment.contains('(') || segment.contains('[') || segment.starts_with('@') {
                return Err(format!("unsupported path step '{segment}'"));
            }
            steps.push(if *segment == "*" { Step::Any } else { Step::Name((*segment).to_string()) });
        }
        if steps.is_empty() {
            return Err("path selects no element".to_string());
        }
        Ok(Self { descendant, steps, terminal })
    }

    /// Applies the path to a content root, returning the string value of
    /// every matched node in document order.
    pub fn select(&self, root: &ContentNode) -> Vec<String> {
        let mut current: Vec<&ContentNode> = if self.descendant {
            let mut all = Vec::new();
            collect_descendants(root, &mut all);
            all.into_iter().filter(|n| self.steps[0].matches(n)).collect()
        } else if self.steps[0].matches(root) {
            vec![root]
        } else {
            Vec::new()
        };

        for step in &self.steps[1..] {
            current = current
                .iter()
                .flat_map(|node| node.children.iter().filter(|c| step.matches(c)))
                .collect();
        }

        current
            .into_iter()
            .filter_map(|node| match &self.terminal {
                Terminal::Text => Some(node.text.clone()),
                Terminal::Attribute(name) => node.attribute(name).map(ToString::to_string),
            })
            .collect()
    }
}

fn collect_descendants<'a>(node: &'a ContentNode, out: &mut Vec<&'a ContentNode>) {
    out.push(node);
    for child in &node.children {
        collect_descendants(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ContentNode {
        ContentNode::element(
            "md:record",
            vec![ContentNode::element(
                "md:patient",
                vec![
                    ContentNode::text_element("md:patientDoB", "1992-03-21"),
                    ContentNode {
                        name: "md:patientContact".to_string(),
                        attributes: vec![("email".to_string(), "b.simpson@example.com".to_string())],
                        ..ContentNode::default()
                    },
                ],
            )],
        )
    }

    #[test]
    fn selects_text_of_nested_element() {
        let path = SelectorPath::parse("md:record/md:patient/md:patientDoB/text()", false).unwrap();
        assert_eq!(path.select(&record()), vec!["1992-03-21"]);
    }

    #[test]
    fn text_terminal_is_the_default() {
        let explicit = SelectorPath::parse("md:record/md:patient/md:patientDoB/text()", false).unwrap();
        let implicit = SelectorPath::parse("md:record/md:patient/md:patientDoB", false).unwrap();
        assert_eq!(explicit.select(&record()), implicit.select(&record()));
    }

    #[test]
    fn selects_attribute_node() {
        let path = SelectorPath::parse("md:record/md:patient/md:patientContact/@email", false).unwrap();
        assert_eq!(path.select(&record()), vec!["b.simpson@example.com"]);
    }

    #[test]
    fn wildcard_step_matches_any_element() {
        let path = SelectorPath::parse("md:record/*/md:patientDoB", false).unwrap();
        assert_eq!(path.select(&record()), vec!["1992-03-21"]);
    }

    #[test]
    fn non_matching_path_selects_nothing() {
        let path = SelectorPath::parse("md:record/md:doctor/text()", false).unwrap();
        assert!(path.select(&record()).is_empty());
    }

    #[test]
    fn descendant_steps_are_gated() {
        assert!(SelectorPath::parse("//md:patientDoB", false).is_err());
        let path = SelectorPath::parse("//md:patientDoB", true).unwrap();
        assert_eq!(path.select(&record()), vec!["1992-03-21"]);
    }

    #[test]
    fn rejects_unsupported_constructs() {
        assert!(SelectorPath::parse("", false).is_err());
        assert!(SelectorPath::parse("a//b", false).is_err());
        assert!(SelectorPath::parse("a/b[1]", false).is_err());
        assert!(SelectorPath::parse("a/last()", false).is_err());
        assert!(SelectorPath::parse("a/@", false).is_err());
    }
}
