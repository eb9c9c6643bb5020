//! Terminal projections of a [`StudioSnapshot`]. Views never mutate studio
//! state; they turn user gestures into [`StudioCommand`]s.

use aura_contracts::notices::{ASSISTANT_THINKING, EMPTY_BOARD_PROMPT};
use aura_contracts::storyboard::{Message, Role, Scene, SceneId};

use crate::studio::{StudioCommand, StudioSnapshot};

const MIN_ID_PREFIX_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneCard {
    /// 1-based position on the board.
    pub position: usize,
    pub id: SceneId,
    pub title: String,
    pub description: String,
    pub dialogue: String,
    pub has_image: bool,
    pub is_generating: bool,
}

impl SceneCard {
    fn from_scene(position: usize, scene: &Scene) -> Self {
        Self {
            position,
            id: scene.id.clone(),
            title: scene.title.clone(),
            description: scene.description.clone(),
            dialogue: scene.dialogue.clone(),
            has_image: scene.image_url.is_some(),
            is_generating: scene.is_generating,
        }
    }

    pub fn render(&self) -> String {
        let status = if self.is_generating {
            "生成中"
        } else if self.has_image {
            "配图"
        } else {
            "无配图"
        };
        let mut lines = vec![
            format!("[{:02}] {}  ({status})", self.position, self.title),
            format!("     {}", self.description),
        ];
        for line in self.dialogue.lines().filter(|line| !line.trim().is_empty()) {
            lines.push(format!("     「{}」", line.trim()));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardLayout {
    Empty { prompt: &'static str },
    Grid(Vec<SceneCard>),
}

/// The storyboard grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneBoard {
    layout: BoardLayout,
    add_enabled: bool,
}

impl SceneBoard {
    pub fn new(snapshot: &StudioSnapshot) -> Self {
        let layout = if snapshot.scenes.is_empty() {
            BoardLayout::Empty {
                prompt: EMPTY_BOARD_PROMPT,
            }
        } else {
            BoardLayout::Grid(
                snapshot
                    .scenes
                    .iter()
                    .enumerate()
                    .map(|(index, scene)| SceneCard::from_scene(index + 1, scene))
                    .collect(),
            )
        };
        Self {
            layout,
            add_enabled: !snapshot.scene_busy(),
        }
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn add_enabled(&self) -> bool {
        self.add_enabled
    }

    pub fn cards(&self) -> &[SceneCard] {
        match &self.layout {
            BoardLayout::Empty { .. } => &[],
            BoardLayout::Grid(cards) => cards,
        }
    }

    /// `None` while a scene request is in flight.
    pub fn add_scene(&self, hint: Option<String>) -> Option<StudioCommand> {
        self.add_enabled.then(|| StudioCommand::AddScene { hint })
    }

    /// Resolves `target` as a 1-based position or a unique id prefix.
    pub fn select(&self, target: &str) -> Option<StudioCommand> {
        self.find(target)
            .map(|card| StudioCommand::SelectScene(card.id.clone()))
    }

    pub fn find(&self, target: &str) -> Option<&SceneCard> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        let cards = self.cards();
        if let Ok(position) = target.parse::<usize>() {
            return cards.iter().find(|card| card.position == position);
        }
        if target.chars().count() < MIN_ID_PREFIX_CHARS {
            return None;
        }
        let mut matches = cards
            .iter()
            .filter(|card| card.id.as_str().starts_with(target));
        let first = matches.next()?;
        matches.next().is_none().then_some(first)
    }

    pub fn render(&self) -> String {
        match &self.layout {
            BoardLayout::Empty { prompt } => format!("（暂无场景）\n{prompt}"),
            BoardLayout::Grid(cards) => {
                let mut out: Vec<String> = cards.iter().map(SceneCard::render).collect();
                if !self.add_enabled {
                    out.push("（新场景生成中，暂时无法添加）".to_string());
                }
                out.join("\n\n")
            }
        }
    }
}

/// Chat transcript plus the one piece of local state: the draft input line.
#[derive(Debug, Clone, Default)]
pub struct AssistantPanel {
    input: String,
    seen: Option<(usize, bool)>,
    scroll_anchor: Option<usize>,
    /// Messages already handed out by `take_unread`.
    read: usize,
}

impl AssistantPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Commits the draft. Blank input and a busy assistant suppress the
    /// submission and keep the draft; otherwise the draft is cleared and sent
    /// as typed.
    pub fn submit(&mut self, assistant_busy: bool) -> Option<StudioCommand> {
        if self.input.trim().is_empty() || assistant_busy {
            return None;
        }
        Some(StudioCommand::SendMessage(std::mem::take(&mut self.input)))
    }

    /// Moves the scroll anchor to the newest entry when the transcript length
    /// or the thinking indicator changed. Returns whether it moved.
    pub fn sync(&mut self, snapshot: &StudioSnapshot) -> bool {
        let key = (snapshot.messages.len(), snapshot.assistant_busy());
        if self.seen == Some(key) {
            return false;
        }
        self.seen = Some(key);
        let entries = key.0 + usize::from(key.1);
        self.scroll_anchor = entries.checked_sub(1);
        true
    }

    /// Index of the bottom transcript entry; the thinking line counts as one
    /// entry after the last message.
    pub fn scroll_anchor(&self) -> Option<usize> {
        self.scroll_anchor
    }

    /// Whether the thinking line was showing at the last `sync`.
    pub fn thinking(&self) -> bool {
        self.seen.is_some_and(|(_, busy)| busy)
    }

    /// Messages between the previous call and the scroll anchor.
    pub fn take_unread<'a>(&mut self, snapshot: &'a StudioSnapshot) -> &'a [Message] {
        let visible = self
            .scroll_anchor
            .map_or(0, |anchor| anchor + 1)
            .min(snapshot.messages.len());
        let start = self.read.min(visible);
        self.read = visible;
        &snapshot.messages[start..visible]
    }

    /// Lines to print for `snapshot`: assistant messages that scrolled into
    /// view, then the thinking line if it just appeared. User messages are
    /// skipped since the terminal already shows what was typed.
    pub fn take_updates(&mut self, snapshot: &StudioSnapshot) -> Vec<String> {
        let was_thinking = self.thinking();
        if !self.sync(snapshot) {
            return Vec::new();
        }
        let mut lines: Vec<String> = self
            .take_unread(snapshot)
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .map(transcript_line)
            .collect();
        if self.thinking() && !was_thinking {
            lines.push(format!("{}: {ASSISTANT_THINKING}", speaker(Role::Assistant)));
        }
        lines
    }

    /// The last `max_entries` transcript lines, oldest first.
    pub fn render_transcript(&self, snapshot: &StudioSnapshot, max_entries: usize) -> String {
        let mut lines: Vec<String> = snapshot
            .messages
            .iter()
            .map(transcript_line)
            .collect();
        if snapshot.assistant_busy() {
            lines.push(format!("Aura: {ASSISTANT_THINKING}"));
        }
        let skip = lines.len().saturating_sub(max_entries);
        lines.split_off(skip).join("\n")
    }
}

fn transcript_line(message: &Message) -> String {
    format!("{}: {}", speaker(message.role), message.content)
}

pub fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "你",
        Role::Assistant => "Aura",
    }
}
