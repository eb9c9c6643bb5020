//! Fixed user-facing copy. The studio speaks Chinese, so every notice and
//! placeholder is stored verbatim here and never assembled at runtime.

/// Hint used when a scene is requested without one.
pub const DEFAULT_SCENE_HINT: &str = "一段充满戏剧冲突的新场景。";

pub const PLACEHOLDER_TITLE: &str = "正在构思场景...";
pub const PLACEHOLDER_DESCRIPTION: &str = "正在构建视觉氛围与叙事结构...";
pub const PLACEHOLDER_DIALOGUE: &str = "...";

/// Assistant reply used when the chat model returns nothing.
pub const EMPTY_REPLY_FALLBACK: &str = "抱歉，我无法处理该请求。";

/// Assistant notice appended when the chat call fails.
pub const CHAT_ERROR_NOTICE: &str = "连接 Aura 服务时出错。请检查您的 API 配置。";

/// Assistant notice appended when scene generation fails at any step.
pub const SCENE_ERROR_NOTICE: &str = "在创建场景时遇到了点小麻烦，让我们换个思路吧。";

/// Call-to-action shown by the board while there are no scenes.
pub const EMPTY_BOARD_PROMPT: &str = "开始你的剧场创作：输入 /scene 或让 Aura 为你构思一个场景。";

pub const ASSISTANT_THINKING: &str = "Aura 正在思考...";
