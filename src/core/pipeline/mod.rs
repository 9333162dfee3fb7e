pub mod prompt;
pub mod sanitize;

use tracing::warn;

use crate::core::agent::Agent;
use crate::core::error::CycleError;
use crate::core::llm::{GenerationRequest, TextGenerator};
use crate::core::social::SocialClient;

/// Generation token budget per post. Generous for 280 characters.
pub const GENERATION_MAX_TOKENS: u32 = 80;
pub const GENERATION_TEMPERATURE: f32 = 0.7;
/// Context cap for one search call.
pub const CONTEXT_MAX_ITEMS: u32 = 20;

/// Result of one cycle. The token pair is always meaningful: refresh
/// tokens are single-use, so a rotation obtained in step 2 must be
/// persisted by the caller even when a later step failed.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub post_id: Option<String>,
    pub text: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    pub error: Option<CycleError>,
}

impl CycleOutcome {
    #[allow(dead_code)]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(access: String, refresh: String, text: Option<String>, error: CycleError) -> Self {
        Self {
            post_id: None,
            text,
            access_token: access,
            refresh_token: refresh,
            error: Some(error),
        }
    }
}

/// One publish cycle for one agent: validate, refresh credentials,
/// optionally gather context, assemble instructions, generate,
/// sanitize, publish. Per invocation: 0-1 context fetch, exactly one
/// generation call, 0-1 publish call. Nothing here retries; the next
/// scheduled cycle is the retry mechanism.
pub async fn run_cycle(
    agent: &Agent,
    generator: &dyn TextGenerator,
    social: &dyn SocialClient,
) -> CycleOutcome {
    let mut access = agent.access_token.clone().unwrap_or_default();
    let mut refresh = agent.refresh_token.clone().unwrap_or_default();

    if let Err(e) = agent.validate_for_cycle() {
        return CycleOutcome::failed(access, refresh, None, e);
    }

    // Exactly one refresh attempt. Failure is soft: the cycle carries
    // on with the current access token, which may itself be rejected
    // downstream and surface as a publish failure.
    match social
        .refresh_token(&agent.client_id, &agent.client_secret, &refresh)
        .await
    {
        Ok(pair) => {
            access = pair.access_token;
            refresh = pair.refresh_token;
        }
        Err(e) => {
            warn!(
                agent = %agent.id,
                "token refresh failed, reusing current access token: {e:#}"
            );
        }
    }

    // Context is best-effort enrichment; a provider error never
    // aborts the cycle.
    let context = if agent.read_context {
        match social
            .search_recent(&access, &agent.topic, CONTEXT_MAX_ITEMS)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(agent = %agent.id, "context fetch failed, generating without context: {e:#}");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let (system, user) = prompt::build_instructions(agent, &context);
    let request = GenerationRequest {
        model: agent.model.clone(),
        system,
        user,
        max_tokens: GENERATION_MAX_TOKENS,
        temperature: GENERATION_TEMPERATURE,
    };

    let raw = match generator.generate(&agent.llm_api_key, &request).await {
        Ok(text) => text,
        Err(e) => {
            return CycleOutcome::failed(
                access,
                refresh,
                None,
                CycleError::Generation(format!("{e:#}")),
            );
        }
    };

    let text = sanitize::sanitize_post(&raw);

    match social.publish(&access, &text).await {
        Ok(post_id) => CycleOutcome {
            post_id: Some(post_id),
            text: Some(text),
            access_token: access,
            refresh_token: refresh,
            error: None,
        },
        Err(e) => CycleOutcome::failed(
            access,
            refresh,
            Some(text),
            CycleError::Publish(format!("{e:#}")),
        ),
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::{MockGenerator, MockSocial};
    use super::*;
    use crate::core::agent::Agent;

    fn cycle_agent() -> Agent {
        let mut a = Agent::new("agent_1".to_string());
        a.name = "Nova".to_string();
        a.client_id = "cid".to_string();
        a.client_secret = "csecret".to_string();
        a.access_token = Some("old-access".to_string());
        a.refresh_token = Some("old-refresh".to_string());
        a.llm_api_key = "sk-test".to_string();
        a.personality = "curious".to_string();
        a.posting_style = "short takes".to_string();
        a.interval_minutes = 5;
        a.paused = false;
        a
    }

    #[tokio::test]
    async fn full_cycle_without_context() {
        let agent = cycle_agent();
        let generator = MockGenerator::replying("\"gm [world] 🚀 #vibes everyone\"");
        let social = MockSocial::healthy();

        let outcome = run_cycle(&agent, &generator, &social).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.post_id.as_deref(), Some("post_1"));
        assert_eq!(generator.call_count(), 1);
        assert_eq!(social.counts(), (1, 0, 1));

        let text = outcome.text.unwrap();
        assert!(text.chars().count() <= sanitize::MAX_POST_CHARS);
        assert!(!text.contains('[') && !text.contains(']'));
        assert!(!text.starts_with(['\'', '"']) && !text.ends_with(['\'', '"']));
        assert_eq!(text, "gm world everyone");
    }

    #[tokio::test]
    async fn context_cycle_feeds_prompt_and_caps_search() {
        let mut agent = cycle_agent();
        agent.read_context = true;
        agent.topic = "#Bitcoin".to_string();

        let generator = MockGenerator::replying("fees are low, sentiment is up");
        let mut social = MockSocial::healthy();
        social.search_results = Some(vec![
            "btc ripping".to_string(),
            "fees are low".to_string(),
            "halving soon".to_string(),
        ]);

        let outcome = run_cycle(&agent, &generator, &social).await;
        assert!(outcome.is_success());
        assert_eq!(social.counts(), (1, 1, 1));
        assert_eq!(
            *social.last_search.lock().unwrap(),
            Some(("#Bitcoin".to_string(), CONTEXT_MAX_ITEMS))
        );

        let request = generator.last_request.lock().unwrap().clone().unwrap();
        assert!(request.system.contains("posts about #Bitcoin"));
        assert!(request.system.contains("do NOT copy them verbatim"));
        assert!(request.system.contains("halving soon"));
        assert_eq!(request.max_tokens, GENERATION_MAX_TOKENS);
        assert_eq!(request.temperature, GENERATION_TEMPERATURE);
    }

    #[tokio::test]
    async fn refresh_failure_is_soft_and_keeps_old_tokens() {
        let agent = cycle_agent();
        let generator = MockGenerator::replying("still here");
        let mut social = MockSocial::healthy();
        social.refresh_result = None;

        let outcome = run_cycle(&agent, &generator, &social).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.access_token, "old-access");
        assert_eq!(outcome.refresh_token, "old-refresh");
        // Generation and publish still ran on the stale token.
        assert_eq!(generator.call_count(), 1);
        assert_eq!(social.counts(), (1, 0, 1));
    }

    #[tokio::test]
    async fn context_fetch_failure_is_soft() {
        let mut agent = cycle_agent();
        agent.read_context = true;
        agent.topic = "#Bitcoin".to_string();

        let generator = MockGenerator::replying("no context needed");
        let mut social = MockSocial::healthy();
        social.search_results = None;

        let outcome = run_cycle(&agent, &generator, &social).await;
        assert!(outcome.is_success());
        let request = generator.last_request.lock().unwrap().clone().unwrap();
        assert!(!request.system.contains("You have read"));
    }

    #[tokio::test]
    async fn generation_failure_aborts_before_publish_but_rotates_tokens() {
        let agent = cycle_agent();
        let generator = MockGenerator::failing();
        let social = MockSocial::healthy();

        let outcome = run_cycle(&agent, &generator, &social).await;
        assert!(matches!(outcome.error, Some(CycleError::Generation(_))));
        assert_eq!(social.counts(), (1, 0, 0));
        // Rotation from the successful refresh is still handed back.
        assert_eq!(outcome.access_token, "new-access");
        assert_eq!(outcome.refresh_token, "new-refresh");
        assert!(outcome.text.is_none());
    }

    #[tokio::test]
    async fn publish_failure_keeps_text_and_rotated_tokens() {
        let agent = cycle_agent();
        let generator = MockGenerator::replying("doomed post");
        let mut social = MockSocial::healthy();
        social.publish_ok = false;

        let outcome = run_cycle(&agent, &generator, &social).await;
        assert!(matches!(outcome.error, Some(CycleError::Publish(_))));
        assert_eq!(outcome.text.as_deref(), Some("doomed post"));
        assert_eq!(outcome.access_token, "new-access");
        assert_eq!(outcome.refresh_token, "new-refresh");
    }

    #[tokio::test]
    async fn config_error_short_circuits_all_external_calls() {
        let mut agent = cycle_agent();
        agent.personality.clear();

        let generator = MockGenerator::replying("unused");
        let social = MockSocial::healthy();

        let outcome = run_cycle(&agent, &generator, &social).await;
        assert!(matches!(outcome.error, Some(CycleError::Config(_))));
        assert_eq!(generator.call_count(), 0);
        assert_eq!(social.counts(), (0, 0, 0));
        assert_eq!(outcome.access_token, "old-access");
    }

    #[tokio::test]
    async fn malformed_topic_is_a_config_error() {
        let mut agent = cycle_agent();
        agent.read_context = true;
        agent.topic = "#two#tags".to_string();

        let social = MockSocial::healthy();
        let outcome = run_cycle(&agent, &MockGenerator::replying("x"), &social).await;
        assert!(matches!(outcome.error, Some(CycleError::Config(_))));
        assert_eq!(social.counts(), (0, 0, 0));
    }
}
