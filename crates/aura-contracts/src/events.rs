//! Session event log: one JSON object per line in `events.jsonl`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::storyboard::{MessageId, Role, SceneId, WorkspaceView};

/// Everything the studio records about a session. The variant name becomes
/// the `type` field of the logged line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudioEvent {
    SessionStarted {
        out_dir: String,
    },
    SessionFinished {
        summary_path: String,
    },
    MessageAppended {
        message_id: MessageId,
        role: Role,
        fallback: bool,
    },
    ChatFailed {
        kind: String,
        error: String,
    },
    ScenePlaceholder {
        scene_id: SceneId,
        hint: String,
    },
    SceneContent {
        scene_id: SceneId,
        title: String,
    },
    SceneReady {
        scene_id: SceneId,
        title: String,
        has_image: bool,
    },
    SceneFailed {
        scene_id: SceneId,
        kind: String,
    },
    SceneSelected {
        scene_id: SceneId,
        found: bool,
    },
    ViewChanged {
        view: WorkspaceView,
    },
    StoryboardExported {
        document: String,
        images: usize,
    },
}

impl StudioEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StudioEvent::SessionStarted { .. } => "session_started",
            StudioEvent::SessionFinished { .. } => "session_finished",
            StudioEvent::MessageAppended { .. } => "message_appended",
            StudioEvent::ChatFailed { .. } => "chat_failed",
            StudioEvent::ScenePlaceholder { .. } => "scene_placeholder",
            StudioEvent::SceneContent { .. } => "scene_content",
            StudioEvent::SceneReady { .. } => "scene_ready",
            StudioEvent::SceneFailed { .. } => "scene_failed",
            StudioEvent::SceneSelected { .. } => "scene_selected",
            StudioEvent::ViewChanged { .. } => "view_changed",
            StudioEvent::StoryboardExported { .. } => "storyboard_exported",
        }
    }
}

/// Append handle on a session's event log. The file is opened once and shared
/// by every clone; lines from concurrent writers never interleave.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<EventLogInner>,
}

#[derive(Debug)]
struct EventLogInner {
    path: PathBuf,
    session_id: String,
    file: Mutex<File>,
}

impl EventLog {
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        Ok(Self {
            inner: Arc::new(EventLogInner {
                path,
                session_id: session_id.into(),
                file: Mutex::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn record(&self, event: &StudioEvent) -> Result<()> {
        let Value::Object(mut line) = serde_json::to_value(event)? else {
            return Err(anyhow!("{} did not serialize to an object", event.kind()));
        };
        line.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        line.insert("ts".to_string(), Value::String(now_utc_iso()));

        let mut text = serde_json::to_string(&line)?;
        text.push('\n');
        let mut file = self
            .inner
            .file
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("failed to append to {}", self.inner.path.display()))
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    fn read_lines(path: &Path) -> Result<Vec<Value>> {
        fs::read_to_string(path)?
            .lines()
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }

    #[test]
    fn record_tags_line_with_event_and_session() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let log = EventLog::open(&path, "session-7")?;

        let scene_id = SceneId::generate();
        log.record(&StudioEvent::ScenePlaceholder {
            scene_id: scene_id.clone(),
            hint: "雾中的渡口".to_string(),
        })?;
        log.record(&StudioEvent::ViewChanged {
            view: WorkspaceView::Playback,
        })?;

        let lines = read_lines(&path)?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "scene_placeholder");
        assert_eq!(lines[0]["scene_id"], scene_id.as_str());
        assert_eq!(lines[0]["hint"], "雾中的渡口");
        assert_eq!(lines[0]["session_id"], "session-7");
        DateTime::parse_from_rfc3339(lines[0]["ts"].as_str().unwrap_or(""))?;
        assert_eq!(lines[1]["type"], "view_changed");
        assert_eq!(lines[1]["view"], "playback");
        Ok(())
    }

    #[test]
    fn kind_matches_serialized_type() -> Result<()> {
        let events = [
            StudioEvent::MessageAppended {
                message_id: MessageId::generate(),
                role: Role::Assistant,
                fallback: true,
            },
            StudioEvent::SceneFailed {
                scene_id: SceneId::generate(),
                kind: "malformed_payload".to_string(),
            },
            StudioEvent::StoryboardExported {
                document: "storyboard.md".to_string(),
                images: 2,
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event)?;
            assert_eq!(value["type"], event.kind());
        }
        Ok(())
    }

    #[test]
    fn open_appends_to_existing_log_and_creates_dirs() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        fs::create_dir_all(temp.path().join("nested"))?;
        fs::write(&path, "{\"type\":\"earlier\"}\n")?;

        let log = EventLog::open(&path, "session-8")?;
        let shared = log.clone();
        log.record(&StudioEvent::SessionStarted {
            out_dir: "out".to_string(),
        })?;
        shared.record(&StudioEvent::SessionFinished {
            summary_path: "out/summary.json".to_string(),
        })?;

        let types: Vec<Value> = read_lines(&path)?
            .into_iter()
            .map(|line| line["type"].clone())
            .collect();
        assert_eq!(types, vec!["earlier", "session_started", "session_finished"]);
        Ok(())
    }

    #[test]
    fn open_fails_when_path_is_a_directory() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let err = EventLog::open(temp.path(), "session-9")
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.starts_with("failed to open event log"), "unexpected: {err}");
        Ok(())
    }
}
