mod command_registry;
mod intent_parser;

pub use command_registry::CHAT_HELP_COMMANDS;
pub use intent_parser::{mentions_scene_request, parse_intent, Intent, SCENE_TRIGGER_PHRASES};
