use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use snipline_core::ToolDescriptor;

// Input: what the agent posts to /api/<tool>
#[derive(Debug, Default, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolRequest {
    /// String form of a scalar argument; null and missing are `None`.
    pub fn arg(&self, name: &str) -> Option<String> {
        match self.arguments.get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

// Output: the tool's text result
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResponse {
    pub content: String,
}

impl ToolResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ToolListing {
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
