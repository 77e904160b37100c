use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

fn default_any() -> String {
    "any".to_string()
}

/// Declared parameter (or shared-store input) of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub key: String,
    #[serde(rename = "type", default = "default_any")]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParamSpec {
    pub fn new(key: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            param_type: param_type.into(),
            description: String::new(),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Nested field of a dict-typed output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureField {
    #[serde(rename = "type", default = "default_any")]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub structure: IndexMap<String, StructureField>,
}

impl StructureField {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            description: String::new(),
            structure: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, field: StructureField) -> Self {
        self.structure.insert(key.into(), field);
        self
    }
}

/// Declared output of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub key: String,
    #[serde(rename = "type", default = "default_any")]
    pub output_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub structure: IndexMap<String, StructureField>,
}

impl OutputField {
    pub fn new(key: impl Into<String>, output_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            output_type: output_type.into(),
            description: String::new(),
            structure: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, field: StructureField) -> Self {
        self.structure.insert(key.into(), field);
        self
    }
}

/// Interface metadata advertised by a node type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub inputs: Vec<ParamSpec>,
    #[serde(default)]
    pub outputs: Vec<OutputField>,
    #[serde(default)]
    pub actions: Vec<String>,
}

impl NodeMetadata {
    /// Look up a declared param, falling back to declared shared-store inputs.
    pub fn param(&self, key: &str) -> Option<&ParamSpec> {
        self.params
            .iter()
            .chain(self.inputs.iter())
            .find(|spec| spec.key == key)
    }

    pub fn output(&self, key: &str) -> Option<&OutputField> {
        self.outputs.iter().find(|output| output.key == key)
    }

    pub fn output_keys(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.key.as_str()).collect()
    }
}

/// Read-only lookup of node-type metadata keyed by node type name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    nodes: IndexMap<String, NodeMetadata>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node_type: impl Into<String>, metadata: NodeMetadata) {
        self.nodes.insert(node_type.into(), metadata);
    }

    /// Overlay every entry of `other`, replacing same-named node types.
    pub fn merge(&mut self, other: Registry) {
        self.nodes.extend(other.nodes);
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeMetadata> {
        self.nodes.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.nodes.contains_key(node_type)
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn output(&self, node_type: &str, key: &str) -> Option<&OutputField> {
        self.get(node_type).and_then(|meta| meta.output(key))
    }

    /// Raw declared type of a param, as written in the metadata.
    pub fn param_type(&self, node_type: &str, key: &str) -> Option<&str> {
        self.get(node_type)
            .and_then(|meta| meta.param(key))
            .map(|spec| spec.param_type.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_lookup_falls_back_to_inputs() {
        let meta = NodeMetadata {
            params: vec![ParamSpec::new("command", "str")],
            inputs: vec![ParamSpec::new("stdin", "any")],
            ..NodeMetadata::default()
        };
        assert_eq!(meta.param("command").unwrap().param_type, "str");
        let mut registry = Registry::new();
        registry.insert("shell", meta.clone());
        assert_eq!(registry.param_type("shell", "stdin"), Some("any"));
        assert_eq!(registry.len(), 1);
        assert_eq!(meta.param("stdin").unwrap().param_type, "any");
        assert!(meta.param("missing").is_none());
    }

    #[test]
    fn registry_deserializes_nested_structure() {
        let registry: Registry = serde_json::from_value(json!({
            "http": {
                "outputs": [{
                    "key": "response",
                    "type": "dict",
                    "structure": {"headers": {"type": "dict"}, "status": {"type": "int"}}
                }]
            }
        }))
        .unwrap();

        let output = registry.output("http", "response").unwrap();
        assert_eq!(output.structure["status"].field_type, "int");
        assert!(registry.contains("http"));
    }
}
