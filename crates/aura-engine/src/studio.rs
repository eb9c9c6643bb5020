//! Root controller: sole owner of the scene and message collections.
//!
//! State lives in a [`watch`] channel. Every mutation replaces whole
//! collections inside one `send_modify`, so a subscriber sees either the state
//! before an update or after it, never a half-applied one. Busy flags are
//! counters of in-flight requests and only gate UI controls; nothing here
//! locks, queues or cancels a request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aura_contracts::chat::mentions_scene_request;
use aura_contracts::events::{EventLog, StudioEvent};
use aura_contracts::notices::{
    CHAT_ERROR_NOTICE, DEFAULT_SCENE_HINT, EMPTY_REPLY_FALLBACK, SCENE_ERROR_NOTICE,
};
use aura_contracts::storyboard::{
    ChatTurn, Message, MessageId, MessageKind, Role, Scene, SceneDraft, SceneId, WorkspaceView,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::gateway::{error_chain_text, AiGateway, FailureKind};

const ERROR_DETAIL_MAX_CHARS: usize = 512;

/// Read-only copy of controller state handed to views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudioSnapshot {
    pub scenes: Vec<Scene>,
    pub messages: Vec<Message>,
    pub view: WorkspaceView,
    assistant_jobs: usize,
    scene_jobs: usize,
}

impl StudioSnapshot {
    pub fn assistant_busy(&self) -> bool {
        self.assistant_jobs > 0
    }

    pub fn scene_busy(&self) -> bool {
        self.scene_jobs > 0
    }

    pub fn scene(&self, id: &SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| &scene.id == id)
    }

    fn jobs_mut(&mut self, flag: BusyFlag) -> &mut usize {
        match flag {
            BusyFlag::Assistant => &mut self.assistant_jobs,
            BusyFlag::Scene => &mut self.scene_jobs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusyFlag {
    Assistant,
    Scene,
}

/// Actions the views ask the controller to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioCommand {
    SendMessage(String),
    AddScene { hint: Option<String> },
    SelectScene(SceneId),
    SetView(WorkspaceView),
}

#[derive(Debug)]
pub enum SceneOutcome {
    Ready(Scene),
    Failed { scene_id: SceneId, kind: FailureKind },
}

#[derive(Debug)]
pub enum ChatOutcome {
    /// Empty or whitespace-only input; nothing happened.
    Ignored,
    Replied {
        message_id: MessageId,
        used_fallback: bool,
        scene_task: Option<JoinHandle<SceneOutcome>>,
    },
    Failed(FailureKind),
}

/// Result of [`Studio::dispatch`]; long-running commands come back as tasks.
#[derive(Debug)]
pub enum Dispatch {
    Chat(JoinHandle<ChatOutcome>),
    Scene(JoinHandle<SceneOutcome>),
    Selected(Option<Scene>),
    ViewChanged(WorkspaceView),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudioStats {
    pub messages: u64,
    pub scenes: u64,
    pub failed_scenes: u64,
}

#[derive(Clone)]
pub struct Studio {
    inner: Arc<StudioInner>,
}

struct StudioInner {
    gateway: Arc<dyn AiGateway>,
    state: watch::Sender<StudioSnapshot>,
    events: Option<EventLog>,
    failed_scenes: AtomicU64,
}

impl Studio {
    pub fn new(gateway: Arc<dyn AiGateway>, events: Option<EventLog>) -> Self {
        let (state, _) = watch::channel(StudioSnapshot::default());
        Self {
            inner: Arc::new(StudioInner {
                gateway,
                state,
                events,
                failed_scenes: AtomicU64::new(0),
            }),
        }
    }

    pub fn gateway_name(&self) -> &str {
        self.inner.gateway.name()
    }

    pub fn snapshot(&self) -> StudioSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<StudioSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn stats(&self) -> StudioStats {
        let state = self.inner.state.borrow();
        StudioStats {
            messages: state.messages.len() as u64,
            scenes: state.scenes.len() as u64,
            failed_scenes: self.inner.failed_scenes.load(Ordering::Relaxed),
        }
    }

    /// Routes a view command. Chat and scene requests are spawned on the
    /// current tokio runtime and returned as handles; the user message and the
    /// busy flags are already in place when this returns.
    pub fn dispatch(&self, command: StudioCommand) -> Dispatch {
        match command {
            StudioCommand::SendMessage(text) => {
                let pending = self.begin_chat(&text);
                let studio = self.clone();
                Dispatch::Chat(tokio::spawn(async move {
                    match pending {
                        Some(pending) => studio.finish_chat(pending).await,
                        None => ChatOutcome::Ignored,
                    }
                }))
            }
            StudioCommand::AddScene { hint } => Dispatch::Scene(self.spawn_scene(hint)),
            StudioCommand::SelectScene(id) => Dispatch::Selected(self.select_scene(&id)),
            StudioCommand::SetView(view) => {
                self.set_view(view);
                Dispatch::ViewChanged(view)
            }
        }
    }

    pub async fn submit_chat_message(&self, text: &str) -> ChatOutcome {
        match self.begin_chat(text) {
            Some(pending) => self.finish_chat(pending).await,
            None => ChatOutcome::Ignored,
        }
    }

    /// Appends the user message and raises the assistant flag in one state
    /// change. `None` for blank input.
    fn begin_chat(&self, text: &str) -> Option<PendingChat> {
        if text.trim().is_empty() {
            return None;
        }

        let user_message = Message::user(text);
        let user_id = user_message.id.clone();
        let mut history: Vec<ChatTurn> = Vec::new();
        self.update(|state| {
            history = state.messages.iter().map(ChatTurn::from).collect();
            state.messages = appended(&state.messages, user_message);
            *state.jobs_mut(BusyFlag::Assistant) += 1;
        });
        let busy = BusyGuard::held(self, BusyFlag::Assistant);
        self.emit(StudioEvent::MessageAppended {
            message_id: user_id,
            role: Role::User,
            fallback: false,
        });
        Some(PendingChat {
            text: text.to_string(),
            history,
            _busy: busy,
        })
    }

    async fn finish_chat(&self, pending: PendingChat) -> ChatOutcome {
        let text = pending.text.as_str();
        let reply = self.inner.gateway.converse(&pending.history, text).await;

        match reply {
            Ok(reply) => {
                let used_fallback = reply.is_empty();
                if used_fallback {
                    warn!(
                        kind = FailureKind::EmptyResponse.as_str(),
                        gateway = self.gateway_name(),
                        "assistant returned an empty reply; using fallback"
                    );
                }
                let requests_scene = mentions_scene_request(text);
                let kind = if requests_scene {
                    MessageKind::SceneSuggestion
                } else {
                    MessageKind::Text
                };
                let content = if used_fallback {
                    EMPTY_REPLY_FALLBACK.to_string()
                } else {
                    reply
                };
                let assistant_message = Message::assistant(content).with_kind(kind);
                let message_id = assistant_message.id.clone();
                self.update(|state| {
                    state.messages = appended(&state.messages, assistant_message);
                });
                self.emit(StudioEvent::MessageAppended {
                    message_id: message_id.clone(),
                    role: Role::Assistant,
                    fallback: used_fallback,
                });

                let scene_task = if requests_scene {
                    debug!("chat text mentions a scene; starting scene generation");
                    Some(self.spawn_scene(Some(text.to_string())))
                } else {
                    None
                };
                ChatOutcome::Replied {
                    message_id,
                    used_fallback,
                    scene_task,
                }
            }
            Err(err) => {
                let detail = error_chain_text(&err, ERROR_DETAIL_MAX_CHARS);
                warn!(
                    kind = FailureKind::Transport.as_str(),
                    gateway = self.gateway_name(),
                    error = %detail,
                    "chat request failed"
                );
                self.update(|state| {
                    state.messages =
                        appended(&state.messages, Message::assistant(CHAT_ERROR_NOTICE));
                });
                self.emit(StudioEvent::ChatFailed {
                    kind: FailureKind::Transport.as_str().to_string(),
                    error: detail,
                });
                ChatOutcome::Failed(FailureKind::Transport)
            }
        }
    }

    pub async fn create_scene(&self, hint: Option<String>) -> SceneOutcome {
        let busy = BusyGuard::raise(self, BusyFlag::Scene);
        self.run_scene(hint, busy).await
    }

    async fn run_scene(&self, hint: Option<String>, _busy: BusyGuard) -> SceneOutcome {
        let hint = hint
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_SCENE_HINT.to_string());

        let scene_id = SceneId::generate();
        let placeholder = Scene::placeholder(scene_id.clone());
        self.update(|state| {
            state.scenes = appended(&state.scenes, placeholder);
        });
        info!(scene_id = %scene_id, "scene placeholder added");
        self.emit(StudioEvent::ScenePlaceholder {
            scene_id: scene_id.clone(),
            hint: hint.clone(),
        });

        match self.generate_scene(&scene_id, &hint).await {
            Ok(scene) => {
                info!(
                    scene_id = %scene_id,
                    has_image = scene.image_url.is_some(),
                    "scene ready"
                );
                self.emit(StudioEvent::SceneReady {
                    scene_id: scene_id.clone(),
                    title: scene.title.clone(),
                    has_image: scene.image_url.is_some(),
                });
                SceneOutcome::Ready(scene)
            }
            Err(kind) => {
                self.update(|state| {
                    state.scenes = removed(&state.scenes, &scene_id);
                    state.messages =
                        appended(&state.messages, Message::assistant(SCENE_ERROR_NOTICE));
                });
                self.inner.failed_scenes.fetch_add(1, Ordering::Relaxed);
                self.emit(StudioEvent::SceneFailed {
                    scene_id: scene_id.clone(),
                    kind: kind.as_str().to_string(),
                });
                SceneOutcome::Failed { scene_id, kind }
            }
        }
    }

    /// Selection has no effect on state yet; it is logged for a future detail
    /// view.
    pub fn select_scene(&self, id: &SceneId) -> Option<Scene> {
        let scene = self.inner.state.borrow().scene(id).cloned();
        info!(scene_id = %id, found = scene.is_some(), "scene selected");
        self.emit(StudioEvent::SceneSelected {
            scene_id: id.clone(),
            found: scene.is_some(),
        });
        scene
    }

    pub fn set_view(&self, view: WorkspaceView) {
        let mut changed = false;
        self.inner.state.send_if_modified(|state| {
            changed = state.view != view;
            state.view = view;
            changed
        });
        if changed {
            info!(view = view.as_str(), "workspace view changed");
            self.emit(StudioEvent::ViewChanged { view });
        }
    }

    /// The busy flag is raised before the task is spawned, so the scene
    /// counts as in flight even before its first poll.
    fn spawn_scene(&self, hint: Option<String>) -> JoinHandle<SceneOutcome> {
        let busy = BusyGuard::raise(self, BusyFlag::Scene);
        let studio = self.clone();
        tokio::spawn(async move { studio.run_scene(hint, busy).await })
    }

    async fn generate_scene(&self, scene_id: &SceneId, hint: &str) -> Result<Scene, FailureKind> {
        let raw = self
            .inner
            .gateway
            .generate_structured_scene(hint)
            .await
            .map_err(|err| self.log_scene_failure(scene_id, FailureKind::Transport, &err))?;
        if raw.trim().is_empty() {
            let err = anyhow::anyhow!("structured scene response was empty");
            return Err(self.log_scene_failure(scene_id, FailureKind::EmptyResponse, &err));
        }
        let draft = SceneDraft::from_json(&raw)
            .map_err(|err| self.log_scene_failure(scene_id, FailureKind::MalformedPayload, &err))?;

        self.update(|state| {
            state.scenes = replaced(&state.scenes, scene_id, |scene| scene.with_draft(&draft));
        });
        self.emit(StudioEvent::SceneContent {
            scene_id: scene_id.clone(),
            title: draft.title.clone(),
        });

        let image_url = self
            .inner
            .gateway
            .generate_image(&draft.description)
            .await
            .map_err(|err| self.log_scene_failure(scene_id, FailureKind::Transport, &err))?;
        if image_url.is_none() {
            info!(scene_id = %scene_id, "no image returned; keeping text-only scene");
        }

        let mut finished: Option<Scene> = None;
        self.update(|state| {
            state.scenes = replaced(&state.scenes, scene_id, |scene| {
                scene.finished(image_url.clone())
            });
            finished = state.scene(scene_id).cloned();
        });
        Ok(finished.unwrap_or_else(|| {
            Scene::placeholder(scene_id.clone())
                .with_draft(&draft)
                .finished(image_url)
        }))
    }

    fn log_scene_failure(
        &self,
        scene_id: &SceneId,
        kind: FailureKind,
        err: &anyhow::Error,
    ) -> FailureKind {
        let detail = error_chain_text(err, ERROR_DETAIL_MAX_CHARS);
        warn!(
            scene_id = %scene_id,
            kind = kind.as_str(),
            gateway = self.gateway_name(),
            error = %detail,
            "scene generation failed"
        );
        kind
    }

    fn update(&self, modify: impl FnOnce(&mut StudioSnapshot)) {
        self.inner.state.send_modify(modify);
    }

    fn emit(&self, event: StudioEvent) {
        let Some(events) = self.inner.events.as_ref() else {
            return;
        };
        if let Err(err) = events.record(&event) {
            warn!(event = event.kind(), error = %err, "failed to record studio event");
        }
    }
}

/// Holds one unit of a busy counter; released on drop, including when the
/// owning future is dropped mid-request.
struct BusyGuard {
    studio: Studio,
    flag: BusyFlag,
}

impl BusyGuard {
    fn raise(studio: &Studio, flag: BusyFlag) -> Self {
        studio.update(|state| *state.jobs_mut(flag) += 1);
        Self::held(studio, flag)
    }

    /// Takes over a unit the caller already added to the counter.
    fn held(studio: &Studio, flag: BusyFlag) -> Self {
        Self {
            studio: studio.clone(),
            flag,
        }
    }
}

/// Chat submission that is visible in the transcript and waiting on the
/// gateway.
struct PendingChat {
    text: String,
    history: Vec<ChatTurn>,
    _busy: BusyGuard,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let flag = self.flag;
        self.studio.update(|state| {
            let jobs = state.jobs_mut(flag);
            *jobs = jobs.saturating_sub(1);
        });
    }
}

fn appended<T: Clone>(items: &[T], item: T) -> Vec<T> {
    let mut next = Vec::with_capacity(items.len() + 1);
    next.extend_from_slice(items);
    next.push(item);
    next
}

fn replaced(scenes: &[Scene], id: &SceneId, change: impl Fn(&Scene) -> Scene) -> Vec<Scene> {
    scenes
        .iter()
        .map(|scene| {
            if &scene.id == id {
                change(scene)
            } else {
                scene.clone()
            }
        })
        .collect()
}

fn removed(scenes: &[Scene], id: &SceneId) -> Vec<Scene> {
    scenes
        .iter()
        .filter(|scene| &scene.id != id)
        .cloned()
        .collect()
}
