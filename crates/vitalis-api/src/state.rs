use std::sync::Arc;
use std::time::Duration;

use vitalis_context::{ContextAssembler, ContextProvider, PromptBuilder};
use vitalis_digest::DigestGenerator;
use vitalis_llm::ChatClient;
use vitalis_persist::{IdentityResolver, WellnessStore};

use crate::config::Config;
use crate::rate_limit::RateLimiter;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub llm_client: Arc<dyn ChatClient>,
    pub identity: Arc<dyn IdentityResolver>,
    pub context: Arc<dyn ContextProvider>,
    pub prompt: PromptBuilder,
    pub rate_limiter: RateLimiter,
    pub digest: DigestGenerator,
}

impl AppState {
    pub fn new(
        config: Config,
        llm_client: Arc<dyn ChatClient>,
        identity: Arc<dyn IdentityResolver>,
        store: Arc<dyn WellnessStore>,
    ) -> anyhow::Result<Self> {
        let mut prompt = PromptBuilder::new()?.max_history_tokens(config.llm.max_history_tokens);
        if let Some(rules) = &config.llm.system_prompt {
            prompt = prompt.system_rules(rules.clone());
        }

        let rate_limiter = RateLimiter::in_memory(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_secs),
        );

        let context: Arc<dyn ContextProvider> = Arc::new(
            ContextAssembler::new(store.clone()).with_limits(config.context.limits()),
        );
        let digest = DigestGenerator::new(store, llm_client.clone(), config.llm.digest_model.clone());

        Ok(Self {
            config,
            llm_client,
            identity,
            context,
            prompt,
            rate_limiter,
            digest,
        })
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }
}
