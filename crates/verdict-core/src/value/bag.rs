//! The bag: XACML's sole collection type.

use std::fmt;
use std::slice;

use super::datatype::Datatype;
use super::error::ValueError;
use super::AttributeValue;

/// An unordered multiset of attribute values sharing one datatype.
///
/// Equality is multiset equality: same element counts, any order. The
/// element datatype is fixed at construction and every element is checked
/// against it, so a well-formed bag can never be mixed.
#[derive(Debug, Clone)]
pub struct Bag {
    datatype: Datatype,
    values: Vec<AttributeValue>,
}

impl Bag {
    /// An empty bag of the given element datatype.
    pub const fn empty(datatype: Datatype) -> Self {
        Self { datatype, values: Vec::new() }
    }

    /// A single-element bag.
    pub fn singleton(value: AttributeValue) -> Self {
        Self { datatype: value.datatype(), values: vec![value] }
    }

    /// Builds a bag from values, checking each against the element datatype.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::MixedBag`] if any value has a different
    /// datatype.
    pub fn of(
        datatype: Datatype,
        values: impl IntoIterator<Item = AttributeValue>,
    ) -> Result<Self, ValueError> {
        let values: Vec<AttributeValue> = values.into_iter().collect();
        for value in &values {
            if value.datatype() != datatype {
                return Err(ValueError::MixedBag {
                    bag_datatype: datatype.short_name().to_string(),
                    value_datatype: value.datatype().short_name().to_string(),
                });
            }
        }
        Ok(Self { datatype, values })
    }

    /// The element datatype.
    pub const fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Number of elements, counting duplicates.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the bag has no elements.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Membership test using datatype-specific equality.
    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Iterates the elements in insertion order. The order is an
    /// implementation artifact; bag semantics are unordered.
    pub fn iter(&self) -> slice::Iter<'_, AttributeValue> {
        self.values.iter()
    }

    /// The elements with duplicates removed, preserving first occurrence.
    pub fn unique(&self) -> Vec<&AttributeValue> {
        let mut seen: Vec<&AttributeValue> = Vec::with_capacity(self.values.len());
        for value in &self.values {
            if !seen.iter().any(|s| *s == value) {
                seen.push(value);
            }
        }
        seen
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl PartialEq for Bag {
    /// Multiset equality: bags are equal iff every element occurs the same
    /// number of times in both. Quadratic, which is fine for the small bags
    /// decision requests carry.
    fn eq(&self, other: &Self) -> bool {
        if self.datatype != other.datatype || self.values.len() != other.values.len() {
            return false;
        }
        let mut used = vec![false; other.values.len()];
        'outer: for value in &self.values {
            for (slot, candidate) in other.values.iter().enumerate() {
                if !used[slot] && value == candidate {
                    used[slot] = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}

impl fmt::Display for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bag[", self.datatype)?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Bag {
        Bag::of(
            Datatype::String,
            values.iter().map(|s| AttributeValue::string(*s)),
        )
        .unwrap()
    }

    #[test]
    fn multiset_equality_ignores_order() {
        assert_eq!(strings(&["a", "b", "b"]), strings(&["b", "a", "b"]));
        assert_ne!(strings(&["a", "b"]), strings(&["a", "b", "b"]));
        assert_ne!(strings(&["a", "b", "b"]), strings(&["a", "a", "b"]));
    }

    #[test]
    fn empty_bags_of_different_datatypes_differ() {
        assert_ne!(Bag::empty(Datatype::String), Bag::empty(Datatype::Integer));
        assert_eq!(Bag::empty(Datatype::String), Bag::empty(Datatype::String));
    }

    #[test]
    fn mixed_bag_is_rejected() {
        let result = Bag::of(
            Datatype::String,
            [AttributeValue::string("a"), AttributeValue::integer(1)],
        );
        assert!(matches!(result, Err(ValueError::MixedBag { .. })));
    }

    #[test]
    fn unique_removes_duplicates() {
        let bag = strings(&["a", "b", "a", "c", "b"]);
        let unique: Vec<String> = bag.unique().iter().map(ToString::to_string).collect();
        assert_eq!(unique, ["a", "b", "c"]);
    }

    #[test]
    fn contains_uses_value_equality() {
        let bag = strings(&["a", "b"]);
        assert!(bag.contains(&AttributeValue::string("a")));
        assert!(!bag.contains(&AttributeValue::string("z")));
        assert!(!bag.contains(&AttributeValue::integer(1)));
    }
}
