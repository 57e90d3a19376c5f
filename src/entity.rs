//! Entity and element types
//!
//! An entity is one logical row or document: a name plus an ordered sequence
//! of named values. Element names are not enforced unique; lookups return the
//! first match.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A named value (a column or document field)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    name: String,
    value: Value,
}

impl Element {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.name, self.value)
    }
}

/// One logical row or document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    name: String,
    elements: Vec<Element>,
}

impl Entity {
    /// Create an empty entity
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }

    /// Create an entity from existing elements
    pub fn with_elements(name: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            elements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append an element
    pub fn add(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Append a named value
    pub fn add_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.elements.push(Element::new(name, value));
    }

    /// First element with the given name
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Remove and return the first element with the given name
    pub fn remove(&mut self, name: &str) -> Option<Element> {
        let index = self.elements.iter().position(|e| e.name == name)?;
        Some(self.elements.remove(index))
    }

    /// Names of all elements, in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_add_and_find() {
        let mut entity = Entity::new("Person");
        entity.add_value("name", "Ada");
        entity.add(Element::new("age", 36));

        assert_eq!(entity.name(), "Person");
        assert_eq!(entity.len(), 2);
        assert_eq!(entity.find("age").unwrap().value(), &Value::Int(36));
        assert!(entity.find("missing").is_none());
    }

    #[test]
    fn test_find_returns_first_match() {
        let mut entity = Entity::new("Person");
        entity.add_value("tag", "first");
        entity.add_value("tag", "second");

        assert_eq!(entity.find("tag").unwrap().value().as_str(), Some("first"));
    }

    #[test]
    fn test_remove_first_match_only() {
        let mut entity = Entity::new("Person");
        entity.add_value("tag", "first");
        entity.add_value("name", "Ada");
        entity.add_value("tag", "second");

        let removed = entity.remove("tag").unwrap();
        assert_eq!(removed.value().as_str(), Some("first"));
        assert_eq!(entity.names().collect::<Vec<_>>(), vec!["name", "tag"]);
        assert!(entity.remove("missing").is_none());
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut entity = Entity::new("Person");
        entity.add_value("Name", "Ada");

        assert!(entity.find("name").is_none());
        assert!(entity.find("Name").is_some());
    }

    #[test]
    fn test_empty_entity() {
        let entity = Entity::with_elements("Empty", Vec::new());
        assert!(entity.is_empty());
        assert_eq!(entity.elements().len(), 0);
    }
}
