use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{
    CommandSpec, FREE_TEXT_COMMANDS, NO_ARG_COMMANDS, SINGLE_ARG_COMMANDS,
};

/// Substrings that mark a chat line as a request for a new scene
/// ("generate", "scene", "create", "write one").
pub const SCENE_TRIGGER_PHRASES: &[&str] = &["生成", "场景", "创建", "写一个"];

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub requests_scene: bool,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            requests_scene: false,
            command_args: BTreeMap::new(),
        }
    }
}

/// Plain substring containment; no language model is involved.
pub fn mentions_scene_request(text: &str) -> bool {
    SCENE_TRIGGER_PHRASES
        .iter()
        .any(|phrase| text.contains(phrase))
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, FREE_TEXT_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "hint".to_string(),
                    if arg.is_empty() {
                        Value::Null
                    } else {
                        Value::String(arg.to_string())
                    },
                );
                return intent;
            }

            if let Some((spec, key)) = SINGLE_ARG_COMMANDS
                .iter()
                .find(|(spec, _)| spec.command == command)
            {
                let mut intent = Intent::new(spec.action, text);
                intent
                    .command_args
                    .insert((*key).to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    // Chat text travels untrimmed; only the trigger check looks at it.
    let mut intent = Intent::new("chat", text);
    intent.prompt = Some(text.to_string());
    intent.requests_scene = mentions_scene_request(text);
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{mentions_scene_request, parse_intent};

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(parse_intent("").action, "noop");
        assert_eq!(parse_intent("   \t ").action, "noop");
    }

    #[test]
    fn trigger_phrases_mark_scene_requests() {
        assert!(mentions_scene_request("创建一个场景"));
        assert!(mentions_scene_request("帮我生成点什么"));
        assert!(mentions_scene_request("写一个关于海的故事"));
        assert!(!mentions_scene_request("你好，Aura"));
        assert!(!mentions_scene_request("generate a scene"));
    }

    #[test]
    fn chat_keeps_raw_text() {
        let intent = parse_intent("  创建一个场景 ");
        assert_eq!(intent.action, "chat");
        assert!(intent.requests_scene);
        assert_eq!(intent.prompt.as_deref(), Some("  创建一个场景 "));

        let plain = parse_intent("今天的灵感是什么？");
        assert_eq!(plain.action, "chat");
        assert!(!plain.requests_scene);
    }

    #[test]
    fn scene_command_with_and_without_hint() {
        let with_hint = parse_intent("/scene 灯塔守望者的最后一夜");
        assert_eq!(with_hint.action, "add_scene");
        assert_eq!(with_hint.command_args["hint"], json!("灯塔守望者的最后一夜"));
        assert!(!with_hint.requests_scene);

        let bare = parse_intent("/SCENE");
        assert_eq!(bare.action, "add_scene");
        assert_eq!(bare.command_args["hint"], json!(null));
    }

    #[test]
    fn single_arg_commands() {
        let select = parse_intent("/select 2");
        assert_eq!(select.action, "select_scene");
        assert_eq!(select.command_args["target"], json!("2"));

        let view = parse_intent("/view  editor ");
        assert_eq!(view.action, "set_view");
        assert_eq!(view.command_args["view"], json!("editor"));

        let export = parse_intent("/export");
        assert_eq!(export.action, "export");
        assert_eq!(export.command_args["path"], json!(""));
    }

    #[test]
    fn no_arg_commands_and_aliases() {
        assert_eq!(parse_intent("/scenes").action, "list_scenes");
        assert_eq!(parse_intent("/board").action, "list_scenes");
        assert_eq!(parse_intent("/history").action, "show_transcript");
        assert_eq!(parse_intent("/help").action, "help");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn unknown_command_keeps_name_and_arg() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn lone_slash_is_chat() {
        let intent = parse_intent("/ 场景");
        assert_eq!(intent.action, "chat");
        assert!(intent.requests_scene);
    }
}
