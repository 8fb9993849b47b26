//! The decision request: attribute categories and their content.

use serde::{Deserialize, Serialize};

use super::content::ContentNode;
use crate::value::AttributeValue;

/// Well-known attribute category URIs.
pub mod categories {
    /// The access subject.
    pub const SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    /// The resource.
    pub const RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    /// The action.
    pub const ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    /// The environment.
    pub const ENVIRONMENT: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";
}

/// Well-known attribute identifiers.
pub mod attribute_ids {
    /// Subject identifier.
    pub const SUBJECT_ID: &str = "urn:oasis:names:tc:xacml:1.0:subject:subject-id";
    /// Resource identifier.
    pub const RESOURCE_ID: &str = "urn:oasis:names:tc:xacml:1.0:resource:resource-id";
    /// Action identifier.
    pub const ACTION_ID: &str = "urn:oasis:names:tc:xacml:1.0:action:action-id";
    /// Current time of the decision.
    pub const CURRENT_TIME: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-time";
    /// Current date of the decision.
    pub const CURRENT_DATE: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-date";
    /// Current dateTime of the decision.
    pub const CURRENT_DATETIME: &str = "urn:oasis:names:tc:xacml:1.0:environment:current-dateTime";
}

/// One named attribute of a request category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestAttribute {
    /// Attribute identifier.
    pub id: String,
    /// Optional issuer.
    #[serde(default)]
    pub issuer: Option<String>,
    /// The attribute's values.
    pub values: Vec<AttributeValue>,
    /// Echo this attribute in the response result.
    #[serde(default)]
    pub include_in_result: bool,
}

/// One attribute category of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCategory {
    /// Category URI.
    pub category: String,
    /// Named attributes.
    #[serde(default)]
    pub attributes: Vec<RequestAttribute>,
    /// Optional content fragment for selectors.
    #[serde(default)]
    pub content: Option<ContentNode>,
}

/// An authorization request: the attribute categories describing one
/// access attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// The categories, in request order.
    #[serde(default)]
    pub categories: Vec<RequestCategory>,
}

impl DecisionRequest {
    /// Starts an empty request builder.
    pub fn builder() -> DecisionRequestBuilder {
        DecisionRequestBuilder::default()
    }

    /// Iterates all attributes flagged `include_in_result`, with their
    /// category.
    pub fn included_in_result(&self) -> impl Iterator<Item = (&str, &RequestAttribute)> {
        self.categories.iter().flat_map(|category| {
            category
                .attributes
                .iter()
                .filter(|attribute| attribute.include_in_result)
                .map(move |attribute| (category.category.as_str(), attribute))
        })
    }
}

/// Builder assembling a [`DecisionRequest`] one attribute at a time.
#[derive(Debug, Default)]
pub struct DecisionRequestBuilder {
    categories: Vec<RequestCategory>,
}

impl DecisionRequestBuilder {
    /// Adds a single-valued attribute to a category, creating the category
    /// on first use.
    pub fn attribute(
        self,
        category: impl Into<String>,
        id: impl Into<String>,
        value: AttributeValue,
    ) -> Self {
        self.attribute_entry(category, RequestAttribute {
            id: id.into(),
            issuer: None,
            values: vec![value],
            include_in_result: false,
        })
    }

    /// Adds a fully-specified attribute to a category.
    pub fn attribute_entry(
        mut self,
        category: impl Into<String>,
        attribute: RequestAttribute,
    ) -> Self {
        let category = category.into();
        match self.categories.iter_mut().find(|c| c.category == category) {
            Some(existing) => existing.attributes.push(attribute),
            None => self.categories.push(RequestCategory {
                category,
                attributes: vec![attribute],
                content: None,
            }),
        }
        self
    }

    /// Attaches a content fragment to a category.
    pub fn content(mut self, category: impl Into<String>, content: ContentNode) -> Self {
        let category = category.into();
        match self.categories.iter_mut().find(|c| c.category == category) {
            Some(existing) => existing.content = Some(content),
            None => self.categories.push(RequestCategory {
                category,
                attributes: Vec::new(),
                content: Some(content),
            }),
        }
        self
    }

    /// Finishes the request.
    pub fn build(self) -> DecisionRequest {
        DecisionRequest { categories: self.categories }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_groups_attributes_by_category() {
        let request = DecisionRequest::builder()
            .attribute(categories::SUBJECT, attribute_ids::SUBJECT_ID, AttributeValue::string("alice"))
            .attribute(categories::SUBJECT, "age", AttributeValue::integer(30))
            .attribute(categories::ACTION, attribute_ids::ACTION_ID, AttributeValue::string("read"))
            .build();

        assert_eq!(request.categories.len(), 2);
        assert_eq!(request.categories[0].attributes.len(), 2);
    }

    #[test]
    fn include_in_result_iteration() {
        let request = DecisionRequest::builder()
            .attribute_entry(categories::RESOURCE, RequestAttribute {
                id: attribute_ids::RESOURCE_ID.to_string(),
                issuer: None,
                values: vec![AttributeValue::string("doc-1")],
                include_in_result: true,
            })
            .attribute(categories::ACTION, attribute_ids::ACTION_ID, AttributeValue::string("read"))
            .build();

        let echoed: Vec<_> = request.included_in_result().collect();
        assert_eq!(echoed.len(), 1);
        assert_eq!(echoed[0].1.id, attribute_ids::RESOURCE_ID);
    }
}
