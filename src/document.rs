use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Parameter `{0}` is declared twice")]
    DuplicateParameter(String),

    #[error("Resource `{0}` is declared twice")]
    DuplicateResource(String),

    #[error("Reference to `{0}` does not resolve to a declared parameter or resource")]
    UnresolvedReference(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A CloudFormation template: parameters plus resources. Built once, never
/// mutated after construction, serialized with `to_json`.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Template {
    #[serde(rename = "Parameters")]
    parameters: BTreeMap<String, Parameter>,

    #[serde(rename = "Resources")]
    resources: BTreeMap<String, Resource>,
}

impl Template {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn add_parameter(&mut self, name: &str, parameter: Parameter) -> Result<(), Error> {
        if self.parameters.contains_key(name) {
            return Err(Error::DuplicateParameter(name.to_string()));
        }

        self.parameters.insert(name.to_string(), parameter);
        return Ok(());
    }

    pub fn add_resource(&mut self, name: &str, resource: Resource) -> Result<(), Error> {
        if self.resources.contains_key(name) {
            return Err(Error::DuplicateResource(name.to_string()));
        }

        self.resources.insert(name.to_string(), resource);
        return Ok(());
    }

    /// Serializes the template, first checking that every `Ref` inside the
    /// resources resolves. An unresolved reference is a programming error in
    /// the template content and aborts serialization.
    pub fn to_json(&self) -> Result<String, Error> {
        self.check_references()?;

        return match serde_json::to_string_pretty(self) {
            Ok(text) => Ok(text),
            Err(error) => Err(Error::SerializationError(error.to_string())),
        };
    }

    fn check_references(&self) -> Result<(), Error> {
        let mut targets = Vec::new();
        for resource in self.resources.values() {
            if let Some(metadata) = &resource.metadata {
                collect_refs(metadata, &mut targets);
            }
            for value in resource.properties.values() {
                collect_refs(value, &mut targets);
            }
            if let Some(update_policy) = &resource.update_policy {
                collect_refs(update_policy, &mut targets);
            }
        }

        for target in targets {
            if target.starts_with("AWS::") {
                // Pseudo parameter, supplied by CloudFormation at deploy time.
                continue;
            }
            if !self.parameters.contains_key(target) && !self.resources.contains_key(target) {
                return Err(Error::UnresolvedReference(target.to_string()));
            }
        }

        return Ok(());
    }
}

fn collect_refs<'a>(value: &'a Value, targets: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    targets.push(target);
                    return;
                }
            }
            for nested in map.values() {
                collect_refs(nested, targets);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, targets);
            }
        }
        _ => (),
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    #[serde(rename = "Type")]
    kind: String,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(rename = "Default", skip_serializing_if = "Option::is_none")]
    default: Option<String>,

    #[serde(rename = "MinLength", skip_serializing_if = "Option::is_none")]
    min_length: Option<String>,

    #[serde(rename = "MaxLength", skip_serializing_if = "Option::is_none")]
    max_length: Option<String>,
}

impl Parameter {
    pub fn string(description: &str) -> Self {
        return Self {
            kind: String::from("String"),
            description: Some(description.to_string()),
            default: None,
            min_length: None,
            max_length: None,
        };
    }

    pub fn default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        return self;
    }

    pub fn length(mut self, min: &str, max: &str) -> Self {
        self.min_length = Some(min.to_string());
        self.max_length = Some(max.to_string());
        return self;
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    #[serde(rename = "Type")]
    kind: String,

    #[serde(rename = "Metadata", skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,

    #[serde(rename = "Properties")]
    properties: Map<String, Value>,

    #[serde(rename = "UpdatePolicy", skip_serializing_if = "Option::is_none")]
    update_policy: Option<Value>,
}

impl Resource {
    pub fn new(kind: &str) -> Self {
        return Self {
            kind: kind.to_string(),
            metadata: None,
            properties: Map::new(),
            update_policy: None,
        };
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        return self;
    }

    pub fn property(mut self, name: &str, value: Value) -> Self {
        self.properties.insert(name.to_string(), value);
        return self;
    }

    pub fn update_policy(mut self, update_policy: Value) -> Self {
        self.update_policy = Some(update_policy);
        return self;
    }
}

pub fn r#ref(target: &str) -> Value {
    return json!({ "Ref": target });
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    return json!({ "Fn::Join": [separator, parts] });
}

pub fn base64(value: Value) -> Value {
    return json!({ "Fn::Base64": value });
}
