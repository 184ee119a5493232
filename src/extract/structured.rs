//! `Product`-typed linked data (`<script type="application/ld+json">`).

use serde_json::Value;

use super::page::Page;

/// Fields lifted from the first `Product` node found on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredProduct {
    pub name: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Offer price rendered as text so it flows through the same parser as markup prices.
    pub price: Option<String>,
    pub currency: Option<String>,
    /// Raw schema.org availability, e.g. `https://schema.org/InStock`.
    pub availability: Option<String>,
}

impl StructuredProduct {
    pub fn from_page(page: &Page) -> Option<Self> {
        page.json_ld_blocks().iter().find_map(find_product).map(Self::from_node)
    }

    fn from_node(node: &Value) -> Self {
        let offer = node.get("offers").and_then(first_of);
        Self {
            name: node.get("name").and_then(as_text),
            image: node.get("image").and_then(image_of),
            description: node.get("description").and_then(as_text),
            brand: node.get("brand").and_then(|b| as_text(b).or_else(|| b.get("name").and_then(as_text))),
            price: offer.and_then(|o| {
                o.get("price")
                    .or_else(|| o.get("lowPrice"))
                    .and_then(as_text)
            }),
            currency: offer.and_then(|o| o.get("priceCurrency")).and_then(as_text),
            availability: offer.and_then(|o| o.get("availability")).and_then(as_text),
        }
    }

    /// `InStock`/`PreOrder` mean available, any other declared value means not.
    pub fn is_available(&self) -> Option<bool> {
        self.availability
            .as_deref()
            .map(|a| a.contains("InStock") || a.contains("PreOrder"))
    }
}

fn is_product(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == "Product" || t.ends_with("/Product"),
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Product")),
        _ => false,
    }
}

/// Depth-first search through arrays and `@graph` containers.
fn find_product(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_product),
        Value::Object(map) => {
            if is_product(value) {
                return Some(value);
            }
            map.get("@graph").and_then(find_product)
        }
        _ => None,
    }
}

fn first_of(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn image_of(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(image_of),
        Value::Object(map) => map.get("url").or_else(|| map.get("contentUrl")).and_then(as_text),
        other => as_text(other),
    }
}
