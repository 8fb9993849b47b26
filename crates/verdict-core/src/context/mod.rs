//! The per-request evaluation context.
//!
//! Constructed once per decision from the parsed request, the context
//! answers designator and selector lookups and memoizes their results
//! together with variable values. It lives exactly as long as one decision
//! and is single-threaded: the engine is shared across threads, contexts
//! never are.

mod content;
mod request;

pub use content::{ContentNode, SelectorPath};
pub use request::{
    attribute_ids, categories, DecisionRequest, DecisionRequestBuilder, RequestAttribute,
    RequestCategory,
};

use std::cell::RefCell;
use std::collections::HashMap;

use crate::config::PdpConfig;
use crate::decision::Status;
use crate::expr::Evaluated;
use crate::value::{AttributeValue, Bag, Datatype};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DesignatorKey {
    category: String,
    attribute_id: String,
    issuer: Option<String>,
    datatype: Datatype,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SelectorKey {
    category: String,
    path: String,
    datatype: Datatype,
}

/// Per-request scratchpad: immutable request view plus memoization tables.
#[derive(Debug)]
pub struct EvaluationContext<'r> {
    request: &'r DecisionRequest,
    strict_issuer_match: bool,
    designator_cache: RefCell<HashMap<DesignatorKey, Result<Bag, Status>>>,
    selector_cache: RefCell<HashMap<SelectorKey, Result<Bag, Status>>>,
    variable_cache: RefCell<HashMap<String, Result<Evaluated, Status>>>,
}

impl<'r> EvaluationContext<'r> {
    /// Builds a context over a request.
    pub fn new(request: &'r DecisionRequest, config: &PdpConfig) -> Self {
        Self {
            request,
            strict_issuer_match: config.strict_attribute_issuer_match,
            designator_cache: RefCell::new(HashMap::new()),
            selector_cache: RefCell::new(HashMap::new()),
            variable_cache: RefCell::new(HashMap::new()),
        }
    }

    /// The underlying request.
    pub const fn request(&self) -> &'r DecisionRequest {
        self.request
    }

    /// Resolves an attribute designator to a bag, memoizing the result.
    ///
    /// A designator without an issuer matches attributes of any issuer.
    /// One with an issuer matches that issuer, plus issuer-less attributes
    /// unless strict issuer matching is on. Only values of the designator's
    /// datatype are collected.
    ///
    /// # Errors
    ///
    /// `missing-attribute` when the resulting bag is empty and
    /// `must_be_present` is set.
    pub fn resolve_designator(
        &self,
        category: &str,
        attribute_id: &str,
        issuer: Option<&str>,
        datatype: &Datatype,
        must_be_present: bool,
    ) -> Result<Bag, Status> {
        let key = DesignatorKey {
            category: category.to_string(),
            attribute_id: attribute_id.to_string(),
            issuer: issuer.map(ToString::to_string),
            datatype: datatype.clone(),
        };
        if let Some(cached) = self.designator_cache.borrow().get(&key) {
            return self.require_present(cached.clone(), must_be_present, || {
                format!("attribute {attribute_id} ({datatype}) in {category}")
            });
        }

        let values: Vec<AttributeValue> = self
            .request
            .categories
            .iter()
            .filter(|c| c.category == category)
            .flat_map(|c| &c.attributes)
            .filter(|attribute| attribute.id == attribute_id)
            .filter(|attribute| self.issuer_matches(issuer, attribute.issuer.as_deref()))
            .flat_map(|attribute| &attribute.values)
            .filter(|value| value.datatype() == *datatype)
            .cloned()
            .collect();

        let result = Bag::of(datatype.clone(), values)
            .map_err(|e| Status::processing_error(e.to_string()));
        self.designator_cache.borrow_mut().insert(key, result.clone());
        self.require_present(result, must_be_present, || {
            format!("attribute {attribute_id} ({datatype}) in {category}")
        })
    }

    /// Resolves an attribute selector to a bag, memoizing the result.
    ///
    /// Every matched node is converted to the selector's datatype; a node
    /// outside the datatype's lexical space is a `syntax-error`.
    ///
    /// # Errors
    ///
    /// `missing-attribute` when the selection is empty and
    /// `must_be_present` is set; `syntax-error` on conversion failure.
    pub fn resolve_selector(
        &self,
        category: &str,
        path: &SelectorPath,
        path_text: &str,
        datatype: &Datatype,
        must_be_present: bool,
    ) -> Result<Bag, Status> {
        let key = SelectorKey {
            category: category.to_string(),
            path: path_text.to_string(),
            datatype: datatype.clone(),
        };
        if let Some(cached) = self.selector_cache.borrow().get(&key) {
            return self.require_present(cached.clone(), must_be_present, || {
                format!("selector {path_text} ({datatype}) in {category}")
            });
        }

        let result = self.select(category, path, datatype);
        self.selector_cache.borrow_mut().insert(key, result.clone());
        self.require_present(result, must_be_present, || {
            format!("selector {path_text} ({datatype}) in {category}")
        })
    }

    fn select(
        &self,
        category: &str,
        path: &SelectorPath,
        datatype: &Datatype,
    ) -> Result<Bag, Status> {
        let mut values = Vec::new();
        for request_category in self.request.categories.iter().filter(|c| c.category == category) {
            if let Some(content) = &request_category.content {
                for node_value in path.select(content) {
                    let value = AttributeValue::parse(datatype, &node_value)
                        .map_err(|e| Status::syntax_error(e.to_string()))?;
                    values.push(value);
                }
            }
        }
        Bag::of(datatype.clone(), values).map_err(|e| Status::processing_error(e.to_string()))
    }

    fn require_present(
        &self,
        result: Result<Bag, Status>,
        must_be_present: bool,
        describe: impl FnOnce() -> String,
    ) -> Result<Bag, Status> {
        match result {
            Ok(bag) if bag.is_empty() && must_be_present => {
                Err(Status::missing_attribute(format!("missing {}", describe())))
            }
            other => other,
        }
    }

    fn issuer_matches(&self, wanted: Option<&str>, actual: Option<&str>) -> bool {
        match wanted {
            None => true,
            Some(wanted) => match actual {
                Some(actual) => wanted == actual,
                None => !self.strict_issuer_match,
            },
        }
    }

    /// The memoized value of a variable, if it was evaluated in this
    /// context already.
    pub fn cached_variable(&self, id: &str) -> Option<Result<Evaluated, Status>> {
        self.variable_cache.borrow().get(id).cloned()
    }

    /// Memoizes a variable's value for the rest of this decision.
    pub fn store_variable(&self, id: &str, result: Result<Evaluated, Status>) {
        self.variable_cache
            .borrow_mut()
            .entry(id.to_string())
            .or_insert(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Datatype;

    fn config() -> PdpConfig {
        PdpConfig::default()
    }

    fn request_with_issuers() -> DecisionRequest {
        DecisionRequest::builder()
            .attribute_entry(categories::SUBJECT, RequestAttribute {
                id: "role".to_string(),
                issuer: Some("hr".to_string()),
                values: vec![AttributeValue::string("doctor")],
                include_in_result: false,
            })
            .attribute_entry(categories::SUBJECT, RequestAttribute {
                id: "role".to_string(),
                issuer: None,
                values: vec![AttributeValue::string("employee")],
                include_in_result: false,
            })
            .build()
    }

    #[test]
    fn designator_without_issuer_unions_all_issuers() {
        let request = request_with_issuers();
        let ctx = EvaluationContext::new(&request, &config());
        let bag = ctx
            .resolve_designator(categories::SUBJECT, "role", None, &Datatype::String, false)
            .unwrap();
        assert_eq!(bag.len(), 2);
    }

    #[test]
    fn issuer_designator_accepts_issuerless_unless_strict() {
        let request = request_with_issuers();

        let relaxed = EvaluationContext::new(&request, &config());
        let bag = relaxed
            .resolve_designator(categories::SUBJECT, "role", Some("hr"), &Datatype::String, false)
            .unwrap();
        assert_eq!(bag.len(), 2);

        let strict_config = PdpConfig { strict_attribute_issuer_match: true, ..config() };
        let strict = EvaluationContext::new(&request, &strict_config);
        let bag = strict
            .resolve_designator(categories::SUBJECT, "role", Some("hr"), &Datatype::String, false)
            .unwrap();
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn absent_attribute_empty_bag_or_missing_attribute() {
        let request = DecisionRequest::builder().build();
        let ctx = EvaluationContext::new(&request, &config());

        let bag = ctx
            .resolve_designator(categories::SUBJECT, "age", None, &Datatype::Integer, false)
            .unwrap();
        assert!(bag.is_empty());

        let err = ctx
            .resolve_designator(categories::SUBJECT, "age", None, &Datatype::Integer, true)
            .unwrap_err();
        assert_eq!(err.code, crate::decision::StatusCode::MissingAttribute);
    }

    #[test]
    fn datatype_filters_values() {
        let request = DecisionRequest::builder()
            .attribute(categories::SUBJECT, "age", AttributeValue::integer(30))
            .attribute(categories::SUBJECT, "age", AttributeValue::string("thirty"))
            .build();
        let ctx = EvaluationContext::new(&request, &config());
        let bag = ctx
            .resolve_designator(categories::SUBJECT, "age", None, &Datatype::Integer, false)
            .unwrap();
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn designator_lookup_is_memoized_and_stable() {
        let request = request_with_issuers();
        let ctx = EvaluationContext::new(&request, &config());
        let first = ctx
            .resolve_designator(categories::SUBJECT, "role", None, &Datatype::String, false)
            .unwrap();
        let second = ctx
            .resolve_designator(categories::SUBJECT, "role", None, &Datatype::String, false)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn selector_converts_nodes_to_datatype() {
        let content = ContentNode::element(
            "record",
            vec![ContentNode::text_element("age", "10")],
        );
        let request = DecisionRequest::builder()
            .content(categories::RESOURCE, content)
            .build();
        let ctx = EvaluationContext::new(&request, &config());
        let path = SelectorPath::parse("record/age", false).unwrap();

        let bag = ctx
            .resolve_selector(categories::RESOURCE, &path, "record/age", &Datatype::Integer, false)
            .unwrap();
        assert_eq!(bag.len(), 1);
        assert!(bag.contains(&AttributeValue::integer(10)));

        let err = ctx
            .resolve_selector(categories::RESOURCE, &path, "record/age", &Datatype::Date, false)
            .unwrap_err();
        assert_eq!(err.code, crate::decision::StatusCode::SyntaxError);
    }

    #[test]
    fn variable_cache_stores_first_result() {
        let request = DecisionRequest::builder().build();
        let ctx = EvaluationContext::new(&request, &config());
        assert!(ctx.cached_variable("v").is_none());

        ctx.store_variable("v", Ok(Evaluated::Value(AttributeValue::boolean(true))));
        ctx.store_variable("v", Ok(Evaluated::Value(AttributeValue::boolean(false))));
        let cached = ctx.cached_variable("v").unwrap().unwrap();
        assert_eq!(cached, Evaluated::Value(AttributeValue::boolean(true)));
    }
}
