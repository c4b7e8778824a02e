//! Append-only JSONL transcripts.
//!
//! Each conversation gets a `<conversationId>.jsonl` file under
//! `data_dir/transcripts`. Every persisted message and execution trace is
//! appended as a single JSON line — an audit trail alongside the mutable
//! index files `store.rs` maintains as the source of truth for reads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};
use sa_domain::model::{ExecutionTrace, Message};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TranscriptLine {
    Message(Message),
    Trace(ExecutionTrace),
}

pub struct TranscriptWriter {
    base_dir: PathBuf,
}

impl TranscriptWriter {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    pub fn append(&self, conversation_id: &str, lines: &[TranscriptLine]) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let path = self.base_dir.join(format!("{conversation_id}.jsonl"));
        let mut buf = String::new();
        for line in lines {
            buf.push_str(&serde_json::to_string(line)?);
            buf.push('\n');
        }

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        file.write_all(buf.as_bytes()).map_err(Error::Io)?;
        Ok(())
    }

    /// Read back a transcript. Malformed lines are skipped with a warning
    /// rather than failing the whole read.
    pub fn read(&self, conversation_id: &str) -> Result<Vec<TranscriptLine>> {
        let path = self.base_dir.join(format!("{conversation_id}.jsonl"));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut lines = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<TranscriptLine>(line) {
                Ok(tl) => lines.push(tl),
                Err(e) => {
                    tracing::warn!(
                        conversation_id,
                        error = %e,
                        "skipping malformed transcript line"
                    );
                }
            }
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::model::{MessageType, Role};

    fn sample_message() -> Message {
        let now = chrono::Utc::now();
        Message {
            id: "m1".into(),
            conversation_id: "c1".into(),
            turn_id: None,
            parent_message_id: None,
            role: Role::User,
            kind: MessageType::Text,
            content: "hi".into(),
            elicitation_id: None,
            payload_id: None,
            status: Default::default(),
            tool_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        writer
            .append("c1", &[TranscriptLine::Message(sample_message())])
            .unwrap();
        let lines = writer.read("c1").unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn read_missing_conversation_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        assert!(writer.read("nope").unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(dir.path());
        writer
            .append("c1", &[TranscriptLine::Message(sample_message())])
            .unwrap();

        let path = dir.path().join("c1.jsonl");
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writer
            .append("c1", &[TranscriptLine::Message(sample_message())])
            .unwrap();

        let lines = writer.read("c1").unwrap();
        assert_eq!(lines.len(), 2);
    }
}
