use std::{fs, path::Path};

use anyhow::Error;
use schemars::schema_for;

use crate::config::FlowConfig;
use crate::gateway::{ChatInbound, ChatOutbound};

/// Writes the JSON schemas of the configuration and the chat wire types
/// into `out_dir`.
pub fn write_schema(out_dir: &Path) -> Result<Vec<String>, Error> {
    fs::create_dir_all(out_dir)?;

    let schemas = [
        ("flow-config.schema.json", schema_for!(FlowConfig)),
        ("chat-inbound.schema.json", schema_for!(ChatInbound)),
        ("chat-outbound.schema.json", schema_for!(ChatOutbound)),
    ];

    let mut written = Vec::with_capacity(schemas.len());
    for (file, schema) in schemas {
        fs::write(out_dir.join(file), serde_json::to_string_pretty(&schema)?)?;
        written.push(file.to_string());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_writes_config_schema() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_schema(dir.path()).unwrap();

        assert_eq!(written.len(), 3);
        let raw = fs::read_to_string(dir.path().join("flow-config.schema.json")).unwrap();
        let schema: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(schema["title"], "FlowConfig");
        assert!(schema["properties"]["ussd"].is_object());
    }
}
