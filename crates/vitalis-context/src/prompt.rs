use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tiktoken_rs::{cl100k_base, CoreBPE};

use vitalis_llm::{ConversationMessage, Message};

use crate::assembler::UserContextBlock;
use crate::templates::{DEFAULT_SYSTEM_PROMPT, FOCUS_MODE_PROMPT};

/// Conversation mode requested by the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Default,
    Focus,
}

/// Merges rules, user context and history into the gateway payload
#[derive(Clone)]
pub struct PromptBuilder {
    system_rules: String,
    focus_rules: String,
    max_history_tokens: usize,
    bpe: Arc<CoreBPE>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| anyhow::anyhow!("Tokenizer error: {}", e))?;

        Ok(Self {
            system_rules: DEFAULT_SYSTEM_PROMPT.to_string(),
            focus_rules: FOCUS_MODE_PROMPT.to_string(),
            max_history_tokens: 6_000,
            bpe: Arc::new(bpe),
        })
    }

    pub fn system_rules(mut self, rules: impl Into<String>) -> Self {
        self.system_rules = rules.into();
        self
    }

    pub fn max_history_tokens(mut self, tokens: usize) -> Self {
        self.max_history_tokens = tokens;
        self
    }

    /// System message text: rules, clock, mode addendum, then the context block
    pub fn system_prompt(
        &self,
        user_context: &UserContextBlock,
        mode: ChatMode,
        now: DateTime<Utc>,
    ) -> String {
        let mut prompt = format!(
            "{}\n\nCurrent date and time: {}",
            self.system_rules,
            now.format("%A, %B %-d, %Y, %H:%M UTC"),
        );

        if mode == ChatMode::Focus {
            prompt.push_str("\n\n");
            prompt.push_str(&self.focus_rules);
        }

        prompt.push_str("\n\n# User context\n");
        prompt.push_str(user_context.as_str());
        prompt
    }

    pub fn build(
        &self,
        user_context: &UserContextBlock,
        conversation: Vec<ConversationMessage>,
        mode: ChatMode,
        now: DateTime<Utc>,
    ) -> Vec<Message> {
        let history = self.window(conversation);

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.system_prompt(user_context, mode, now)));
        messages.extend(history.into_iter().map(Message::from));
        messages
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Keep the newest messages that fit the token budget; the last one always stays
    fn window(&self, conversation: Vec<ConversationMessage>) -> Vec<ConversationMessage> {
        let mut used = 0usize;
        let mut keep = 0usize;

        for (i, msg) in conversation.iter().rev().enumerate() {
            used += self.count_tokens(&msg.content);
            if i > 0 && used > self.max_history_tokens {
                break;
            }
            keep += 1;
        }

        let dropped = conversation.len() - keep;
        if dropped > 0 {
            tracing::debug!(dropped, kept = keep, "Trimmed conversation history to token budget");
        }

        conversation.into_iter().skip(dropped).collect()
    }
}
