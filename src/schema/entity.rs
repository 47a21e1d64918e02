use serde::{Deserialize, Serialize};

use super::AttributeDefinition;

/// A secondary access path over one or more attributes
///
/// Only single-attribute indexes can be queried or created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    name: String,
    attribute_names: Vec<String>,
}

impl Index {
    /// Create an index with an explicit name
    pub fn new(name: impl Into<String>, attribute_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            attribute_names,
        }
    }

    /// Build an index from a comma separated column list declared on `table`
    ///
    /// The name is `<table>.<column>-<column>...`.
    pub fn for_columns(table: &str, columns: &str) -> Self {
        let attribute_names: Vec<String> = columns
            .split(',')
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            name: format!("{}.{}", table, attribute_names.join("-")),
            attribute_names,
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexed attribute names, in order
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// The indexed attribute when the index covers exactly one
    pub fn single_attribute(&self) -> Option<&str> {
        match self.attribute_names.as_slice() {
            [attribute] => Some(attribute),
            _ => None,
        }
    }
}

/// Store-side shape of one entity type
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    table_name: String,
    attributes: Vec<AttributeDefinition>,
    indexes: Vec<Index>,
}

impl EntitySchema {
    /// Create a schema, keeping the first definition of each attribute name
    pub fn new(
        table_name: impl Into<String>,
        attributes: Vec<AttributeDefinition>,
        indexes: Vec<Index>,
    ) -> Self {
        let mut unique: Vec<AttributeDefinition> = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            if !unique.contains(&attribute) {
                unique.push(attribute);
            }
        }

        Self {
            table_name: table_name.into(),
            attributes: unique,
            indexes,
        }
    }

    /// Table name
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Attribute definitions
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    /// Indexes
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Find an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// The primary key attribute, if present
    pub fn primary_key(&self) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.is_primary_key())
    }
}
