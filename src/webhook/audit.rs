//! Append-only log of raw webhook payloads.
//!
//! Each delivery is written as pretty-printed JSON followed by a newline. The
//! file is opened and closed per append; there is no rotation.

use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Payload log backed by a single file
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Creates a log writing to `path`; the file is created on first append
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one payload.
    ///
    /// # Errors
    ///
    /// Returns the I/O or serialization error; nothing is written in that case.
    pub async fn append(&self, payload: &Value) -> io::Result<()> {
        let mut block = serde_json::to_string_pretty(payload)?;
        block.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_appends_blocks_in_order() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(dir.path().join("webhook_log.json"));

        let first = json!({"object": "instagram", "entry": []});
        let second = json!({"entry": [{"messaging": [{"sender": {"id": "1"}, "message": {"text": "hi"}}]}]});
        log.append(&first).await?;
        log.append(&second).await?;

        let contents = tokio::fs::read_to_string(log.path()).await?;
        let blocks: Vec<Value> = serde_json::Deserializer::from_str(&contents)
            .into_iter::<Value>()
            .collect::<Result<_, _>>()?;

        assert_eq!(blocks, vec![first, second]);
        assert!(contents.ends_with("}\n"));
        assert!(contents.contains("\n  \"entry\""));
        Ok(())
    }

    #[tokio::test]
    async fn test_keeps_delivery_key_order() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(dir.path().join("webhook_log.json"));

        let body = r#"{"object":"instagram","entry":[{"time":1,"id":"17841","messaging":[]}]}"#;
        let payload: Value = serde_json::from_str(body)?;
        log.append(&payload).await?;

        let contents = tokio::fs::read_to_string(log.path()).await?;
        assert_eq!(
            contents,
            "{\n  \"object\": \"instagram\",\n  \"entry\": [\n    {\n      \"time\": 1,\n      \"id\": \"17841\",\n      \"messaging\": []\n    }\n  ]\n}\n"
        );
        Ok(())
    }
}
