//! Critique backed by the generative model behind `LlmClient`.

use async_trait::async_trait;
use tracing::warn;

use crate::critique::{parse_suggestions, prompts, CritiqueRequest, CritiqueService, CritiqueUnavailable, Suggestion};
use crate::llm_client::{LlmClient, LlmError};

pub struct LlmCritic {
    llm: LlmClient,
}

impl LlmCritic {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl CritiqueService for LlmCritic {
    async fn critique(&self, request: &CritiqueRequest) -> Result<Vec<Suggestion>, CritiqueUnavailable> {
        let prompt = prompts::build_prompt(request);
        let system = prompts::system_prompt();
        match self.llm.complete_json(&prompt, &system).await {
            Ok(value) => Ok(parse_suggestions(&value)),
            // A reply we cannot read counts as "no suggestions", not an outage.
            Err(LlmError::Parse(e)) => {
                warn!("Critique reply was not valid JSON: {e}");
                Ok(Vec::new())
            }
            Err(LlmError::EmptyContent) => Ok(Vec::new()),
            Err(e) => Err(CritiqueUnavailable::Transport(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
