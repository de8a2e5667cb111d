use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

// The shared tool schema. Both the gateway (routes) and the agent
// (advertised tools) read this same file.
const BUILTIN_CATALOG: &str = include_str!("../../tools/tools.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("tool '{0}' is not in the catalog")]
    NotFound(String),
    #[error("failed to read catalog at '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog '{origin}': {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool '{0}' is declared more than once")]
    Duplicate(String),
    #[error("tool '{tool}' requires undeclared property '{property}'")]
    UndeclaredRequired { tool: String, property: String },
}

// One input property of a tool (matches an entry under "properties" in tools.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySpec>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolDescriptor {
    /// JSON Schema for the tool's arguments, in the shape the agent service
    /// expects for function tools.
    pub fn parameters_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, prop)| {
                (
                    name.clone(),
                    json!({ "type": prop.kind, "description": prop.description }),
                )
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

/// Immutable name -> descriptor lookup, built once at startup.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// The catalog compiled in from `tools/tools.json`.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::parse("tools/tools.json (builtin)", BUILTIN_CATALOG)
    }

    /// Reads an override catalog from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();

        // 1. Read the JSON file
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Read {
                path: path.display().to_string(),
                source,
            })?;

        // 2. Parse and validate it
        let catalog = Self::parse(&path.display().to_string(), &content)?;
        tracing::info!("Loaded {} tools from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn parse(origin: &str, content: &str) -> Result<Self, CatalogError> {
        let tools: Vec<ToolDescriptor> =
            serde_json::from_str(content).map_err(|source| CatalogError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        let mut seen = HashSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(CatalogError::Duplicate(tool.name.clone()));
            }
            if let Some(missing) = tool
                .required
                .iter()
                .find(|r| !tool.properties.contains_key(r.as_str()))
            {
                return Err(CatalogError::UndeclaredRequired {
                    tool: tool.name.clone(),
                    property: missing.clone(),
                });
            }
        }

        Ok(Self { tools })
    }

    pub fn describe(&self, name: &str) -> Result<&ToolDescriptor, CatalogError> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_catalog_lists_the_three_tools() {
        let catalog = ToolCatalog::builtin().unwrap();
        assert_eq!(catalog.names(), vec!["hello_mcp", "get_snippet", "save_snippet"]);
    }

    #[test]
    fn describe_returns_descriptor_or_not_found() {
        let catalog = ToolCatalog::builtin().unwrap();

        let save = catalog.describe("save_snippet").unwrap();
        assert_eq!(save.description, "Save a snippet with a name.");
        assert_eq!(save.required, vec!["snippetname", "snippet"]);
        assert_eq!(save.properties["snippet"].kind, "string");

        let err = catalog.describe("delete_snippet").unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(ref n) if n == "delete_snippet"));
    }

    #[test]
    fn parameters_schema_renders_json_schema_object() {
        let catalog = ToolCatalog::builtin().unwrap();
        let schema = catalog.describe("get_snippet").unwrap().parameters_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["snippetname"]["type"], "string");
        assert_eq!(
            schema["properties"]["snippetname"]["description"],
            "The name of the snippet."
        );
        assert_eq!(schema["required"], json!(["snippetname"]));

        let hello = catalog.describe("hello_mcp").unwrap().parameters_schema();
        assert_eq!(hello["properties"], json!({}));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let content = r#"[
            {"name": "a", "description": "first"},
            {"name": "a", "description": "second"}
        ]"#;
        let err = ToolCatalog::parse("inline", content).unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(ref n) if n == "a"));
    }

    #[test]
    fn required_must_name_a_declared_property() {
        let content = r#"[{"name": "a", "description": "d", "required": ["ghost"]}]"#;
        let err = ToolCatalog::parse("inline", content).unwrap_err();
        assert!(matches!(err, CatalogError::UndeclaredRequired { ref property, .. } if property == "ghost"));
    }

    #[tokio::test]
    async fn load_reads_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "ping", "description": "Ping.", "properties": {{}}}}]"#
        )
        .unwrap();

        let catalog = ToolCatalog::load(file.path()).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.describe("ping").is_ok());
    }

    #[tokio::test]
    async fn load_reports_missing_file() {
        let err = ToolCatalog::load("/definitely/not/here/tools.json")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here/tools.json"));
    }
}
