//! Mounting: turning an element tree into a [`SurfaceNode`] snapshot.
//!
//! Function components are called once with their props; host elements
//! keep their attributes minus event handlers; context providers are
//! visible to `useContext` for the duration of their subtree.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::value::*;

/// Host element nesting beyond which mounting gives up.
const MAX_TREE_DEPTH: usize = 512;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const UNITLESS_STYLES: &[&str] = &[
    "animationIterationCount", "aspectRatio", "columnCount", "fillOpacity", "flex", "flexGrow",
    "flexShrink", "fontWeight", "gridColumn", "gridRow", "lineHeight", "opacity", "order",
    "orphans", "strokeOpacity", "strokeWidth", "tabSize", "widows", "zIndex", "zoom",
];

/// A snapshot of the mounted surface tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceNode {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        children: Vec<SurfaceNode>,
    },
    Text { text: String },
}

impl SurfaceNode {
    pub fn element(tag: impl Into<String>, attributes: IndexMap<String, String>, children: Vec<SurfaceNode>) -> Self {
        SurfaceNode::Element {
            tag: tag.into(),
            attributes,
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        SurfaceNode::Text { text: text.into() }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            SurfaceNode::Element { tag, .. } => Some(tag),
            SurfaceNode::Text { .. } => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            SurfaceNode::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            SurfaceNode::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[SurfaceNode] {
        match self {
            SurfaceNode::Element { children, .. } => children,
            SurfaceNode::Text { .. } => &[],
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            SurfaceNode::Text { text } => out.push_str(text),
            SurfaceNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Every element (this one included) with the given tag, in document order.
    pub fn find_all<'a>(&'a self, tag: &str) -> Vec<&'a SurfaceNode> {
        let mut found = Vec::new();
        self.collect_tag(tag, &mut found);
        found
    }

    fn collect_tag<'a>(&'a self, tag: &str, found: &mut Vec<&'a SurfaceNode>) {
        if self.tag() == Some(tag) {
            found.push(self);
        }
        for child in self.children() {
            child.collect_tag(tag, found);
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            SurfaceNode::Text { text } => escape_into(text, false, out),
            SurfaceNode::Element {
                tag,
                attributes,
                children,
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(value, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

/// HTML for a list of sibling nodes.
pub fn to_html(nodes: &[SurfaceNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.write_html(&mut out);
    }
    out
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Mounting
// ══════════════════════════════════════════════════════════════════════════════

impl Evaluator {
    /// Mount a renderable value (element, text, array of either).
    pub fn mount(&mut self, node: &Value) -> EvalResult<Vec<SurfaceNode>> {
        let mut out = Vec::new();
        self.mount_into(node, 0, 0, &mut out)?;
        Ok(out)
    }

    /// Render `component` with no props and mount the result.
    pub fn mount_component(&mut self, component: &Value) -> EvalResult<Vec<SurfaceNode>> {
        let element = crate::host::create_element(vec![component.clone(), Value::Null]);
        self.mount(&element)
    }

    fn mount_into(&mut self, node: &Value, depth: usize, components: usize, out: &mut Vec<SurfaceNode>) -> EvalResult<()> {
        self.tick()?;
        if depth > MAX_TREE_DEPTH {
            return Err(EvalError::range_error("Maximum element nesting exceeded"));
        }
        match node {
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Function(_) => Ok(()),
            Value::String(s) => {
                out.push(SurfaceNode::text(s.to_string()));
                Ok(())
            }
            Value::Number(n) => {
                out.push(SurfaceNode::text(number_to_string(*n)));
                Ok(())
            }
            Value::Array(items) => {
                for item in items.snapshot() {
                    self.mount_into(&item, depth + 1, components, out)?;
                }
                Ok(())
            }
            Value::Object(obj) if obj.class() == ObjectClass::Element => {
                self.mount_element(obj, depth, components, out)
            }
            Value::Object(obj) => Err(EvalError::type_error(format!(
                "Objects are not valid as a React child (found: object with keys {{{}}})",
                obj.keys().join(", ")
            ))),
        }
    }

    fn mount_element(&mut self, element: &ObjectRef, depth: usize, components: usize, out: &mut Vec<SurfaceNode>) -> EvalResult<()> {
        let element_type = element.get("type").unwrap_or(Value::Undefined);
        let props = element
            .get("props")
            .unwrap_or_else(|| Value::object(PropertyMap::new()));
        let children = props.own_property("children").unwrap_or(Value::Undefined);

        match &element_type {
            Value::String(tag) => {
                let mut mounted = Vec::new();
                self.mount_into(&children, depth + 1, components, &mut mounted)?;
                out.push(SurfaceNode::element(tag.to_string(), host_attributes(&props), mounted));
                Ok(())
            }
            Value::Function(_) => {
                if components >= self.max_call_depth {
                    return Err(EvalError::CallDepthExceeded(self.max_call_depth));
                }
                let rendered = self.call(&element_type, Value::Undefined, vec![props])?;
                self.mount_into(&rendered, depth + 1, components + 1, out)
            }
            Value::Object(marker) => match marker.class() {
                ObjectClass::Fragment | ObjectClass::StrictMode => {
                    self.mount_into(&children, depth + 1, components, out)
                }
                ObjectClass::Provider => {
                    let value = props.own_property("value").unwrap_or(Value::Undefined);
                    self.contexts.push((marker.clone(), value));
                    let result = self.mount_into(&children, depth + 1, components, out);
                    self.contexts.pop();
                    result
                }
                ObjectClass::Consumer => {
                    let value = match marker.get("_provider") {
                        Some(Value::Object(provider)) => self.context_value(&provider),
                        _ => Value::Undefined,
                    };
                    let rendered = self.call(&children, Value::Undefined, vec![value])?;
                    self.mount_into(&rendered, depth + 1, components + 1, out)
                }
                _ => Err(invalid_type(&element_type)),
            },
            other => Err(invalid_type(other)),
        }
    }
}

fn invalid_type(value: &Value) -> EvalError {
    let got = match value {
        Value::Object(_) => "object".to_string(),
        other => other.to_display(),
    };
    EvalError::type_error(format!(
        "Element type is invalid: expected a string (for built-in components) or a function (for composite components) but got: {got}."
    ))
}

/// Attributes of a host element: handlers and React-only props dropped,
/// `className`/`htmlFor` renamed, style objects serialized.
fn host_attributes(props: &Value) -> IndexMap<String, String> {
    let mut attributes = IndexMap::new();
    let Value::Object(props) = props else {
        return attributes;
    };
    for (key, value) in props.entries() {
        if matches!(
            key.as_str(),
            "children" | "key" | "ref" | "dangerouslySetInnerHTML" | "suppressHydrationWarning"
        ) || is_handler(&key)
        {
            continue;
        }
        let text = match &value {
            Value::Undefined | Value::Null | Value::Bool(false) | Value::Function(_) => continue,
            Value::Bool(true) => String::new(),
            Value::Object(style) if key == "style" => {
                let css = style_text(style);
                if css.is_empty() {
                    continue;
                }
                css
            }
            other => other.to_display(),
        };
        let name = match key.as_str() {
            "className" => "class".to_string(),
            "htmlFor" => "for".to_string(),
            _ => key,
        };
        attributes.insert(name, text);
    }
    attributes
}

fn is_handler(key: &str) -> bool {
    key.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

/// `{ marginTop: 8, color: "red" }` to `margin-top:8px;color:red`.
fn style_text(style: &ObjectRef) -> String {
    let mut parts = Vec::new();
    for (key, value) in style.entries() {
        let text = match &value {
            Value::Undefined | Value::Null | Value::Bool(_) => continue,
            Value::Number(n) if *n != 0.0 && !UNITLESS_STYLES.contains(&key.as_str()) && !key.starts_with("--") => {
                format!("{}px", number_to_string(*n))
            }
            other => other.to_display(),
        };
        if text.is_empty() {
            continue;
        }
        parts.push(format!("{}:{text}", css_property(&key)));
    }
    parts.join(";")
}

fn css_property(key: &str) -> String {
    if key.starts_with("--") {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escaping_and_void_elements() {
        let mut attrs = IndexMap::new();
        attrs.insert("alt".to_string(), "a \"b\" & c".to_string());
        let node = SurfaceNode::element(
            "p",
            IndexMap::new(),
            vec![
                SurfaceNode::text("1 < 2"),
                SurfaceNode::element("img", attrs, Vec::new()),
            ],
        );
        assert_eq!(node.to_html(), "<p>1 &lt; 2<img alt=\"a &quot;b&quot; &amp; c\"></p>");
        assert_eq!(node.text_content(), "1 < 2");
    }

    #[test]
    fn test_style_serialization() {
        let style = ObjectRef::new(ObjectClass::Plain, PropertyMap::new());
        style.set("marginTop", Value::Number(8.0));
        style.set("opacity", Value::Number(0.5));
        style.set("backgroundColor", Value::string("red"));
        style.set("padding", Value::Number(0.0));
        assert_eq!(
            style_text(&style),
            "margin-top:8px;opacity:0.5;background-color:red;padding:0"
        );
    }

    #[test]
    fn test_host_attributes_drop_handlers() {
        let props = ObjectRef::new(ObjectClass::Plain, PropertyMap::new());
        props.set("className", Value::string("btn"));
        props.set("onClick", Value::Null);
        props.set("disabled", Value::Bool(true));
        props.set("hidden", Value::Bool(false));
        props.set("children", Value::string("x"));
        let attrs = host_attributes(&Value::Object(props));
        assert_eq!(attrs.get("class").map(String::as_str), Some("btn"));
        assert_eq!(attrs.get("disabled").map(String::as_str), Some(""));
        assert!(!attrs.contains_key("onClick"));
        assert!(!attrs.contains_key("hidden"));
        assert_eq!(attrs.len(), 2);
    }
}
