//! MCP tool implementations.

pub mod cache;
pub mod upstream_get;

#[cfg(test)]
pub(crate) mod testing {
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;

    /// Decode the JSON text payload of a tool result.
    pub fn decode<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
