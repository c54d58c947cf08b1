//! Prompt assembly and response cleanup.

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_FORMATTING_INSTRUCTIONS: &str = "Format my answer in HTML suitable for Atlassian Confluence Cloud. This includes never using ** to mark bold. Always use HTML to replace it if you see that in the text.";

pub const DEFAULT_CONTEXT_PROMPT: &str = "I’d like to ask you for a summary of a chat conversation. First, I will provide you with the context of the conversation so that you can better understand what it’s about, and then I will write the continuation, for which I will ask you to summarize and highlight the most important points. Here is the context:";

pub const DEFAULT_RECENT_MESSAGES_PROMPT: &str = "Now, please summarize the following conversation, highlighting the most important elements in bold. Include the instructions I gave you.";

const SEPARATOR_WIDTH: usize = 10;

/// Caller-supplied prompt overrides. Unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiPrompts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatting_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_messages_prompt: Option<String>,
}

impl AiPrompts {
    /// Prompts asking for markdown output instead of Confluence HTML.
    pub fn markdown() -> Self {
        Self {
            formatting_instructions: Some("Format my answer as markdown".to_string()),
            ..Default::default()
        }
    }

    pub fn formatting_instructions(&self) -> &str {
        self.formatting_instructions
            .as_deref()
            .unwrap_or(DEFAULT_FORMATTING_INSTRUCTIONS)
    }

    pub fn context_prompt(&self) -> &str {
        self.context_prompt.as_deref().unwrap_or(DEFAULT_CONTEXT_PROMPT)
    }

    pub fn recent_messages_prompt(&self) -> &str {
        self.recent_messages_prompt
            .as_deref()
            .unwrap_or(DEFAULT_RECENT_MESSAGES_PROMPT)
    }
}

/// Assemble the full prompt: formatting instructions, the context prompt and
/// a dashed context block, then `>>>`, the formatting instructions again,
/// the recent-messages prompt, and the content to summarize.
pub fn build_prompt(context: &str, content: &str, prompts: &AiPrompts) -> String {
    let formatting = prompts.formatting_instructions();
    let separator = "-".repeat(SEPARATOR_WIDTH);
    format!(
        "{formatting}: \n\n{context_prompt}: \n\n{separator}\n{context}\n{separator}\n\n>>>{formatting}: \n\n{recent}:\n\n\n{content}",
        context_prompt = prompts.context_prompt(),
        recent = prompts.recent_messages_prompt(),
    )
}

/// Remove a surrounding ```` ```html ```` fence, then a plain ```` ``` ````
/// fence, if the model wrapped its answer in one.
pub fn strip_fences(response: &str) -> &str {
    let mut text = response;
    if let Some(inner) = text
        .strip_prefix("```html")
        .and_then(|t| t.strip_suffix("```"))
    {
        debug!("Stripped ```html fence");
        text = inner;
    }
    if let Some(inner) = text.strip_prefix("```").and_then(|t| t.strip_suffix("```")) {
        debug!("Stripped ``` fence");
        text = inner;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_layout() {
        let prompts = AiPrompts {
            formatting_instructions: Some("F".into()),
            context_prompt: Some("C".into()),
            recent_messages_prompt: Some("R".into()),
        };
        let prompt = build_prompt("ctx", "alice: hi\n", &prompts);
        assert_eq!(
            prompt,
            "F: \n\nC: \n\n----------\nctx\n----------\n\n>>>F: \n\nR:\n\n\nalice: hi\n"
        );
    }

    #[test]
    fn test_defaults_fill_missing_prompts() {
        let prompt = build_prompt("", "x", &AiPrompts::default());
        assert!(prompt.starts_with(DEFAULT_FORMATTING_INSTRUCTIONS));
        assert!(prompt.contains(DEFAULT_CONTEXT_PROMPT));
        assert!(prompt.contains(DEFAULT_RECENT_MESSAGES_PROMPT));
        assert_eq!(
            AiPrompts::markdown().formatting_instructions(),
            "Format my answer as markdown"
        );
    }

    #[test]
    fn test_prompts_deserialize_partially() {
        let prompts: AiPrompts =
            serde_json::from_str(r#"{"context_prompt": "Context:"}"#).unwrap();
        assert_eq!(prompts.context_prompt(), "Context:");
        assert_eq!(prompts.formatting_instructions(), DEFAULT_FORMATTING_INSTRUCTIONS);
    }

    #[test]
    fn test_strip_html_fence() {
        assert_eq!(strip_fences("```html<p>hi</p>```"), "<p>hi</p>");
        assert_eq!(strip_fences("```html\n<p>hi</p>\n```"), "\n<p>hi</p>\n");
    }

    #[test]
    fn test_strip_plain_fence() {
        assert_eq!(strip_fences("```summary```"), "summary");
    }

    #[test]
    fn test_unfenced_text_is_untouched() {
        assert_eq!(strip_fences("plain"), "plain");
        assert_eq!(strip_fences("```only start"), "```only start");
        assert_eq!(strip_fences("```"), "```");
    }
}
