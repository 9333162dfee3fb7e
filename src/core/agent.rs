use serde::{Deserialize, Serialize};

use crate::core::error::CycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingStyle {
    Normal,
    Lowercase,
    Uppercase,
}

impl WritingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            WritingStyle::Normal => "normal",
            WritingStyle::Lowercase => "lowercase",
            WritingStyle::Uppercase => "uppercase",
        }
    }

    /// Lenient parse for values coming out of the store.
    pub fn parse(s: &str) -> Self {
        match s {
            "lowercase" => WritingStyle::Lowercase,
            "uppercase" => WritingStyle::Uppercase,
            _ => WritingStyle::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleMode {
    Fixed,
    Random,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Fixed => "fixed",
            ScheduleMode::Random => "random",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "random" => ScheduleMode::Random,
            _ => ScheduleMode::Fixed,
        }
    }
}

/// One independently scheduled posting identity.
///
/// Credential fields (`access_token`, `refresh_token`) are the only
/// fields the pipeline may mutate; everything else belongs to the
/// operator via the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub account_handle: Option<String>,
    pub account_id: Option<String>,
    pub llm_api_key: String,
    pub model: String,
    pub personality: String,
    pub posting_style: String,
    pub writing_style: WritingStyle,
    pub mention_name: bool,
    pub read_context: bool,
    pub topic: String,
    pub schedule_mode: ScheduleMode,
    pub interval_minutes: i64,
    pub paused: bool,
}

impl Agent {
    /// Fresh agent with operator-fillable blanks. Starts paused with
    /// no credentials; becomes eligible only after the operator fills
    /// the required fields and completes the authorization handshake.
    pub fn new(id: String) -> Self {
        Self {
            id,
            name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            access_token: None,
            refresh_token: None,
            account_handle: None,
            account_id: None,
            llm_api_key: String::new(),
            model: "gpt-4o".to_string(),
            personality: String::new(),
            posting_style: String::new(),
            writing_style: WritingStyle::Normal,
            mention_name: false,
            read_context: false,
            topic: String::new(),
            schedule_mode: ScheduleMode::Fixed,
            interval_minutes: 0,
            paused: true,
        }
    }

    fn has_required_fields(&self) -> bool {
        !self.name.is_empty()
            && !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && self.access_token.as_deref().is_some_and(|t| !t.is_empty())
            && self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
            && !self.llm_api_key.is_empty()
            && !self.model.is_empty()
            && !self.personality.is_empty()
            && !self.posting_style.is_empty()
    }

    /// Whether the scheduler may arm a timer for this agent.
    pub fn is_eligible(&self) -> bool {
        if self.paused || !self.has_required_fields() {
            return false;
        }
        if self.read_context && self.topic.trim().is_empty() {
            return false;
        }
        if self.schedule_mode == ScheduleMode::Fixed && self.interval_minutes <= 0 {
            return false;
        }
        true
    }

    /// Pre-flight validation for one publish cycle. Stricter than
    /// eligibility: the topic filter must be exactly one `#`-prefixed
    /// token when context reading is requested.
    pub fn validate_for_cycle(&self) -> Result<(), CycleError> {
        if !self.has_required_fields() {
            return Err(CycleError::Config(
                "missing required fields; fill out credentials and generation config".to_string(),
            ));
        }
        if self.read_context {
            let topic = self.topic.trim();
            let well_formed = topic.starts_with('#')
                && topic.len() > 1
                && topic.matches('#').count() == 1
                && !topic.contains(char::is_whitespace);
            if !well_formed {
                return Err(CycleError::Config(format!(
                    "context reading requires a single topic filter like \"#Bitcoin\", got {:?}",
                    self.topic
                )));
            }
        }
        Ok(())
    }
}
