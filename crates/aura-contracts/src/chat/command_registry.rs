#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose remainder is kept verbatim as free text.
pub(crate) const FREE_TEXT_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "scene",
        action: "add_scene",
    },
    CommandSpec {
        command: "new",
        action: "add_scene",
    },
];

/// Commands taking a single trimmed argument, stored under `key`.
pub(crate) const SINGLE_ARG_COMMANDS: &[(CommandSpec, &str)] = &[
    (
        CommandSpec {
            command: "select",
            action: "select_scene",
        },
        "target",
    ),
    (
        CommandSpec {
            command: "view",
            action: "set_view",
        },
        "view",
    ),
    (
        CommandSpec {
            command: "export",
            action: "export",
        },
        "path",
    ),
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "scenes",
        action: "list_scenes",
    },
    CommandSpec {
        command: "board",
        action: "list_scenes",
    },
    CommandSpec {
        command: "history",
        action: "show_transcript",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/scene [hint]",
    "/scenes",
    "/select <n|id>",
    "/view <storyboard|editor|playback>",
    "/history",
    "/export [dir]",
    "/help",
    "/quit",
];
