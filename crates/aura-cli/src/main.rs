use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use aura_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use aura_contracts::notices::{ASSISTANT_THINKING, SCENE_ERROR_NOTICE};
use aura_contracts::session::export::{export_storyboard, StoryboardExport};
use aura_contracts::storyboard::WorkspaceView;
use aura_engine::{
    build_gateway, AssistantPanel, ChatOutcome, Dispatch, GatewayConfig, GatewayOverrides,
    SceneBoard, SceneOutcome, Studio, StudioCommand, StudioSession, StudioSnapshot,
};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "aura", version, about = "Aura storyboard studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive studio: chat with Aura and build a storyboard.
    Chat(ChatArgs),
    /// Generate a single scene and exit.
    Scene(SceneArgs),
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, requires = "out")]
    events: Option<PathBuf>,
    #[command(flatten)]
    gateway: GatewayArgs,
}

#[derive(Debug, Args)]
struct SceneArgs {
    #[arg(long)]
    hint: Option<String>,
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, requires = "out")]
    events: Option<PathBuf>,
    #[command(flatten)]
    gateway: GatewayArgs,
}

#[derive(Debug, Clone, Default, Args)]
struct GatewayArgs {
    /// Gateway provider (gemini, dryrun).
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    /// HTTP request timeout in seconds.
    #[arg(long)]
    request_timeout: Option<f64>,
}

impl GatewayArgs {
    fn overrides(&self) -> GatewayOverrides {
        GatewayOverrides {
            provider: self.provider.clone(),
            api_base: self.api_base.clone(),
            text_model: self.text_model.clone(),
            image_model: self.image_model.clone(),
            request_timeout_s: self.request_timeout,
        }
    }
}

const TRANSCRIPT_MAX_ENTRIES: usize = 40;
const SCENE_REQUEST_NOTE: &str = "（Aura 回复后会同时为你构思一个场景）";

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("aura error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    match cli.command {
        Command::Chat(args) => {
            runtime.block_on(run_chat(args))?;
            Ok(0)
        }
        Command::Scene(args) => runtime.block_on(run_scene(args)),
    }
}

fn open_studio(
    gateway_args: &GatewayArgs,
    out: Option<&PathBuf>,
    events: Option<&PathBuf>,
) -> Result<(Studio, Option<StudioSession>)> {
    let config = GatewayConfig::resolve(&gateway_args.overrides())?;
    let gateway = build_gateway(&config)?;
    let session = out
        .map(|dir| StudioSession::open(dir, events.cloned()))
        .transpose()?;
    let studio = Studio::new(gateway, session.as_ref().map(|s| s.events().clone()));
    info!(
        gateway = studio.gateway_name(),
        text_model = %config.text_model,
        image_model = %config.image_model,
        session = session.as_ref().map(|s| s.session_id()).unwrap_or("-"),
        "studio ready"
    );
    Ok((studio, session))
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let (studio, session) = open_studio(&args.gateway, args.out.as_ref(), args.events.as_ref())?;
    let renderer = tokio::spawn(render_updates(studio.subscribe()));

    println!(
        "Aura 剧场工作室已启动（{}）。输入 /help 查看命令。",
        studio.gateway_name()
    );

    let mut panel = AssistantPanel::new();
    let mut chats: Vec<JoinHandle<ChatOutcome>> = Vec::new();
    let mut scenes: Vec<JoinHandle<SceneOutcome>> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        chats.retain(|task| !task.is_finished());
        scenes.retain(|task| !task.is_finished());

        let intent = parse_intent(&line);
        match intent.action.as_str() {
            "noop" => continue,
            "quit" => break,
            "help" => {
                println!("命令: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "chat" => {
                panel.set_input(intent.prompt.unwrap_or_default());
                match panel.submit(studio.snapshot().assistant_busy()) {
                    Some(command) => {
                        if let Dispatch::Chat(task) = studio.dispatch(command) {
                            chats.push(task);
                        }
                        if intent.requests_scene {
                            println!("{SCENE_REQUEST_NOTE}");
                        }
                    }
                    None => println!("{ASSISTANT_THINKING} 请稍候再发送。"),
                }
            }
            "add_scene" => {
                let board = SceneBoard::new(&studio.snapshot());
                let hint = value_as_non_empty_string(intent.command_args.get("hint"));
                match board.add_scene(hint) {
                    Some(command) => {
                        if let Dispatch::Scene(task) = studio.dispatch(command) {
                            scenes.push(task);
                        }
                    }
                    None => println!("新场景生成中，请稍候。"),
                }
            }
            "list_scenes" => {
                println!("{}", SceneBoard::new(&studio.snapshot()).render());
            }
            "select_scene" => {
                let Some(target) = value_as_non_empty_string(intent.command_args.get("target"))
                else {
                    println!("/select 需要场景序号或 id");
                    continue;
                };
                let board = SceneBoard::new(&studio.snapshot());
                let Some(command) = board.select(&target) else {
                    println!("未找到场景：{target}");
                    continue;
                };
                if let Dispatch::Selected(Some(scene)) = studio.dispatch(command) {
                    println!("已选择《{}》({})", scene.title, scene.id);
                }
            }
            "set_view" => {
                let raw = value_as_non_empty_string(intent.command_args.get("view"));
                match raw.as_deref().and_then(WorkspaceView::parse) {
                    Some(view) => {
                        studio.dispatch(StudioCommand::SetView(view));
                        println!("当前视图：{}", view.as_str());
                    }
                    None => println!("/view 需要 storyboard、editor 或 playback"),
                }
            }
            "show_transcript" => {
                println!(
                    "{}",
                    panel.render_transcript(&studio.snapshot(), TRANSCRIPT_MAX_ENTRIES)
                );
            }
            "export" => {
                let dir =
                    value_as_non_empty_string(intent.command_args.get("path")).map(PathBuf::from);
                let snapshot = studio.snapshot();
                let result = match (session.as_ref(), dir) {
                    (Some(session), dir) => session.export(dir.as_deref(), &snapshot.scenes),
                    (None, Some(dir)) => export_storyboard(&dir, &snapshot.scenes),
                    (None, None) => {
                        println!("/export 需要目录（或使用 --out 启动）");
                        continue;
                    }
                };
                match result {
                    Ok(export) => print_export(&export),
                    Err(err) => println!("导出失败：{err:#}"),
                }
            }
            "unknown" => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_default();
                println!("未知命令 /{command}，输入 /help 查看命令。");
            }
            other => {
                warn!(action = other, "unhandled chat action");
            }
        }
    }

    let snapshot = studio.snapshot();
    if !chats.is_empty() || snapshot.assistant_busy() || snapshot.scene_busy() {
        println!("等待进行中的请求完成...");
    }
    for chat in chats {
        match chat.await {
            Ok(ChatOutcome::Replied {
                scene_task: Some(task),
                ..
            }) => scenes.push(task),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "chat task ended abnormally"),
        }
    }
    for scene in scenes {
        if let Err(err) = scene.await {
            warn!(error = %err, "scene task ended abnormally");
        }
    }
    // Scenes started from chat tasks that already finished are only visible
    // through the busy counter.
    let mut updates = studio.subscribe();
    if updates
        .wait_for(|state| !state.assistant_busy() && !state.scene_busy())
        .await
        .is_err()
    {
        warn!("studio state closed before requests settled");
    }
    // Let the renderer print the final state before it is stopped.
    tokio::task::yield_now().await;
    renderer.abort();

    if let Some(session) = session {
        let summary_path = session.finish(studio.stats(), studio.gateway_name())?;
        println!("会话摘要：{}", summary_path.display());
    }
    Ok(())
}

async fn run_scene(args: SceneArgs) -> Result<i32> {
    let (studio, session) = open_studio(&args.gateway, args.out.as_ref(), args.events.as_ref())?;

    let outcome = studio.create_scene(args.hint.clone()).await;
    let code = match outcome {
        SceneOutcome::Ready(_) => {
            println!("{}", SceneBoard::new(&studio.snapshot()).render());
            if let Some(session) = session.as_ref() {
                let export = session.export(None, &studio.snapshot().scenes)?;
                print_export(&export);
            }
            0
        }
        SceneOutcome::Failed { kind, .. } => {
            eprintln!("{SCENE_ERROR_NOTICE} ({})", kind.as_str());
            1
        }
    };

    if let Some(session) = session {
        session.finish(studio.stats(), studio.gateway_name())?;
    }
    Ok(code)
}

async fn render_updates(mut updates: watch::Receiver<StudioSnapshot>) {
    let mut transcript = AssistantPanel::new();
    let mut previous = updates.borrow_and_update().clone();
    transcript.sync(&previous);
    transcript.take_unread(&previous);
    while updates.changed().await.is_ok() {
        let next = updates.borrow_and_update().clone();
        let changes = render_changes(&mut transcript, &previous, &next);
        if !changes.is_empty() {
            println!();
            for line in changes {
                println!("{line}");
            }
        }
        previous = next;
    }
}

fn render_changes(
    transcript: &mut AssistantPanel,
    previous: &StudioSnapshot,
    next: &StudioSnapshot,
) -> Vec<String> {
    let mut lines = transcript.take_updates(next);
    lines.extend(describe_scene_changes(previous, next));
    lines
}

/// Board lines for what changed between two snapshots.
fn describe_scene_changes(previous: &StudioSnapshot, next: &StudioSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    for (index, scene) in next.scenes.iter().enumerate() {
        let position = index + 1;
        let before = previous.scene(&scene.id);
        let was_placeholder = before.map(|old| old.is_placeholder()).unwrap_or(true);
        let was_generating = before.map(|old| old.is_generating).unwrap_or(true);
        if before.is_none() && scene.is_placeholder() {
            lines.push(format!("[场景 {position:02}] {}", scene.title));
        }
        if was_placeholder && !scene.is_placeholder() {
            lines.push(format!("[场景 {position:02}] 《{}》", scene.title));
        }
        if was_generating && !scene.is_generating {
            let status = if scene.image_url.is_some() {
                "已完成（含配图）"
            } else {
                "已完成（无配图）"
            };
            lines.push(format!("[场景 {position:02}] {status}"));
        }
    }
    for scene in &previous.scenes {
        if next.scene(&scene.id).is_none() {
            lines.push(format!("[场景] 已撤回：{}", scene.title));
        }
    }

    lines
}

fn print_export(export: &StoryboardExport) {
    println!(
        "已导出 {}（{} 张配图）",
        export.document.display(),
        export.images.len()
    );
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
