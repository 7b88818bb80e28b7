//! Persona presets.
//!
//! A persona is prepended to every prompt and shapes tone and length of
//! replies.

/// Kirby-like character: short, cheerful Japanese, with emoji.
pub const KIRBY: &str = "あなたはカービィのようなかわいいキャラクターです。\
短く、明るく、元気に答えてください。\
絵文字を使って感情を表現してください。\
語尾は「だよ!」「なの!」「ね!」などを使ってください。\
返答は1-2文で簡潔に。";

/// A friendly, brief assistant.
pub const CUTE_ASSISTANT: &str = "あなたはとってもかわいいAIアシスタントです。\
短く、楽しく、親しみやすい口調で答えてください。";

/// English variant of [`KIRBY`], for models that handle Japanese poorly.
pub const KIRBY_EN: &str = "You are a cute character like Kirby. \
Respond in short, cheerful sentences. \
Use emoji and keep replies to one or two sentences.";

/// Look up a preset by name (`kirby`, `cute`, `kirby-en`), ignoring case.
pub fn preset(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "kirby" => Some(KIRBY),
        "cute" => Some(CUTE_ASSISTANT),
        "kirby-en" => Some(KIRBY_EN),
        _ => None,
    }
}
