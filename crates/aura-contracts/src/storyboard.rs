use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notices::{PLACEHOLDER_DESCRIPTION, PLACEHOLDER_DIALOGUE, PLACEHOLDER_TITLE};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneId(String);

impl SceneId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One storyboard card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub title: String,
    pub description: String,
    pub dialogue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub is_generating: bool,
}

impl Scene {
    /// Card shown while a generation request is in flight.
    pub fn placeholder(id: SceneId) -> Self {
        Self {
            id,
            title: PLACEHOLDER_TITLE.to_string(),
            description: PLACEHOLDER_DESCRIPTION.to_string(),
            dialogue: PLACEHOLDER_DIALOGUE.to_string(),
            image_url: None,
            is_generating: true,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
            && self.description == PLACEHOLDER_DESCRIPTION
            && self.dialogue == PLACEHOLDER_DIALOGUE
    }

    pub fn with_draft(&self, draft: &SceneDraft) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            dialogue: draft.dialogue.clone(),
            ..self.clone()
        }
    }

    pub fn finished(&self, image_url: Option<String>) -> Self {
        Self {
            image_url,
            is_generating: false,
            ..self.clone()
        }
    }
}

/// Structured scene content returned by the text model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDraft {
    pub title: String,
    pub description: String,
    pub dialogue: String,
}

impl SceneDraft {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        if raw.trim().is_empty() {
            anyhow::bail!("scene payload is empty");
        }
        serde_json::from_str(raw.trim()).context("scene payload is not a valid scene object")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    /// Assistant reply to a turn that also started scene generation.
    SceneSuggestion,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            content: content.into(),
            kind: MessageKind::Text,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::Assistant,
            content: content.into(),
            kind: MessageKind::Text,
        }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }
}

/// History entry handed to the conversational model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceView {
    #[default]
    Storyboard,
    Editor,
    Playback,
}

impl WorkspaceView {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceView::Storyboard => "storyboard",
            WorkspaceView::Editor => "editor",
            WorkspaceView::Playback => "playback",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "storyboard" | "board" => Some(WorkspaceView::Storyboard),
            "editor" | "edit" => Some(WorkspaceView::Editor),
            "playback" | "play" => Some(WorkspaceView::Playback),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_draft_accepts_exact_schema() -> anyhow::Result<()> {
        let draft = SceneDraft::from_json(
            r#" {"title":"雨夜","description":"霓虹下的街角","dialogue":"你终于来了。"} "#,
        )?;
        assert_eq!(draft.title, "雨夜");
        assert_eq!(draft.description, "霓虹下的街角");
        assert_eq!(draft.dialogue, "你终于来了。");
        Ok(())
    }

    #[test]
    fn scene_draft_rejects_missing_extra_and_non_string_fields() {
        assert!(SceneDraft::from_json(r#"{"title":"a","description":"b"}"#).is_err());
        assert!(SceneDraft::from_json(
            r#"{"title":"a","description":"b","dialogue":"c","mood":"d"}"#
        )
        .is_err());
        assert!(SceneDraft::from_json(r#"{"title":"a","description":"b","dialogue":3}"#).is_err());
        assert!(SceneDraft::from_json("not json").is_err());
        assert!(SceneDraft::from_json("   ").is_err());
    }

    #[test]
    fn placeholder_transitions_keep_identity() {
        let id = SceneId::generate();
        let placeholder = Scene::placeholder(id.clone());
        assert!(placeholder.is_placeholder());
        assert!(placeholder.is_generating);

        let draft = SceneDraft {
            title: "t".to_string(),
            description: "d".to_string(),
            dialogue: "l".to_string(),
        };
        let filled = placeholder.with_draft(&draft);
        assert_eq!(filled.id, id);
        assert!(filled.is_generating);
        assert!(!filled.is_placeholder());

        let done = filled.finished(None);
        assert!(!done.is_generating);
        assert_eq!(done.image_url, None);
        assert_eq!(done.title, "t");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = SceneId::generate();
        let b = SceneId::generate();
        assert_ne!(a, b);
        assert_ne!(MessageId::generate(), MessageId::generate());
    }

    #[test]
    fn workspace_view_parses_aliases() {
        assert_eq!(WorkspaceView::parse("Editor"), Some(WorkspaceView::Editor));
        assert_eq!(WorkspaceView::parse(" play "), Some(WorkspaceView::Playback));
        assert_eq!(WorkspaceView::parse("board"), Some(WorkspaceView::Storyboard));
        assert_eq!(WorkspaceView::parse("gallery"), None);
        assert_eq!(WorkspaceView::default(), WorkspaceView::Storyboard);
    }
}
