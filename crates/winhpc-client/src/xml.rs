//! XML payloads and response extraction
//!
//! The Web API exchanges three document shapes:
//!
//! - a bare serialization wrapper, `<string xmlns="...">value</string>`, for ids,
//!   versions and node names
//! - `ArrayOfProperty`, a flat list of `Property` name/value pairs, for both
//!   request bodies and property queries
//! - the cluster listing returned by `GET /WindowsHPC/Clusters`
//!
//! Elements are matched by local name; namespaces are ignored on read.

use quick_xml::escape::escape;
use roxmltree::{Document, Node};

use crate::error::{HpcClientError, Result};
use crate::types::PropertyMap;

/// Namespace of `ArrayOfProperty` documents
pub const COMMON_NS: &str = "http://schemas.microsoft.com/HPCS2008R2/common";
/// Namespace of the serialization `string` wrapper
pub const SERIALIZATION_NS: &str = "http://schemas.microsoft.com/2003/10/Serialization/";

// =============================================================================
// Payload Builder
// =============================================================================

/// Serialize name/value pairs into an `ArrayOfProperty` document.
///
/// Names and values are XML-escaped. An empty input yields a self-closing
/// `ArrayOfProperty` element.
pub fn property_xml<I, K, V>(properties: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut body = String::new();
    for (name, value) in properties {
        body.push_str("<Property><Name>");
        body.push_str(&escape(name.as_ref()));
        body.push_str("</Name><Value>");
        body.push_str(&escape(value.as_ref()));
        body.push_str("</Value></Property>");
    }

    if body.is_empty() {
        format!("<ArrayOfProperty xmlns=\"{}\" />", COMMON_NS)
    } else {
        format!("<ArrayOfProperty xmlns=\"{}\">{}</ArrayOfProperty>", COMMON_NS, body)
    }
}

/// Wrap a message in the serialization `string` element used by the cancel endpoints
pub fn string_xml(message: &str) -> String {
    format!(
        "<string xmlns=\"{}\">{}</string>",
        SERIALIZATION_NS,
        escape(message)
    )
}

// =============================================================================
// Response Parser
// =============================================================================

/// Text content of the document's root element.
///
/// Returns an empty string when the root has no text.
pub fn parse_string(xml: &str) -> Result<String> {
    let doc = Document::parse(xml)?;
    Ok(doc.root_element().text().unwrap_or_default().to_string())
}

/// Every `Property` element as a name → value entry.
///
/// An empty `Value` element maps to `None`. A `Property` without a non-empty
/// `Name`, or without any `Value` element, is a structure error.
pub fn parse_properties(xml: &str) -> Result<PropertyMap> {
    let doc = Document::parse(xml)?;
    let mut properties = PropertyMap::new();

    for property in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Property")
    {
        let (name, value) = property_pair(property)?;
        properties.insert(name, value);
    }

    Ok(properties)
}

/// Cluster names in document order.
///
/// The service answers with `Object/Properties/Property` entries where the
/// property named `Name` holds the cluster name; some deployments serialize a
/// plain `ArrayOfstring` instead. Both are recognised.
pub fn parse_cluster_names(xml: &str) -> Result<Vec<String>> {
    let doc = Document::parse(xml)?;
    let mut names = Vec::new();

    for node in doc.descendants().filter(Node::is_element) {
        match node.tag_name().name() {
            "Property" => {
                let (name, value) = property_pair(node)?;
                if name.eq_ignore_ascii_case("Name") {
                    if let Some(value) = value {
                        names.push(value);
                    }
                }
            }
            "string" if !node.children().any(|c| c.is_element()) => {
                if let Some(text) = node.text().map(str::trim).filter(|t| !t.is_empty()) {
                    names.push(text.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(names)
}

fn property_pair(property: Node<'_, '_>) -> Result<(String, Option<String>)> {
    let name = child_element(property, "Name")
        .and_then(|n| n.text())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| HpcClientError::structure("Property element without a Name"))?;

    let value = child_element(property, "Value").ok_or_else(|| {
        HpcClientError::structure(format!("Property '{}' has no Value element", name))
    })?;

    Ok((name.to_string(), value.text().map(str::to_string)))
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}
