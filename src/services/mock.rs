//! Scripted backend used by the unit tests in place of the real service.

use std::sync::Mutex;
use std::time::Duration;

use super::error::PipelineError;
use super::gateway::{ModelBackend, ModelRequest};

enum Action {
    Reply(String),
    Fail(String),
    Hang,
}

struct Rule {
    template: String,
    needle: Option<String>,
    action: Action,
}

#[derive(Default)]
pub struct ScriptedBackend {
    rules: Vec<Rule>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn rule(mut self, template: &str, needle: Option<&str>, action: Action) -> Self {
        self.rules.push(Rule {
            template: template.to_string(),
            needle: needle.map(String::from),
            action,
        });
        self
    }

    pub fn reply(self, template: &str, completion: &str) -> Self {
        self.rule(template, None, Action::Reply(completion.to_string()))
    }

    /// Replies only when the rendered prompt contains `needle`.
    pub fn reply_when(self, template: &str, needle: &str, completion: &str) -> Self {
        self.rule(template, Some(needle), Action::Reply(completion.to_string()))
    }

    pub fn fail(self, template: &str, message: &str) -> Self {
        self.rule(template, None, Action::Fail(message.to_string()))
    }

    pub fn hang(self, template: &str) -> Self {
        self.rule(template, None, Action::Hang)
    }

    pub fn hang_when(self, template: &str, needle: &str) -> Self {
        self.rule(template, Some(needle), Action::Hang)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.prompt.clone()).collect()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelBackend for ScriptedBackend {
    async fn complete(&self, _credential: &str, request: ModelRequest) -> Result<String, PipelineError> {
        self.requests.lock().unwrap().push(request.clone());

        let rule = self.rules.iter().find(|rule| {
            rule.template == request.template
                && rule
                    .needle
                    .as_deref()
                    .map_or(true, |needle| request.prompt.contains(needle))
        });

        match rule.map(|r| &r.action) {
            Some(Action::Reply(text)) => Ok(text.clone()),
            Some(Action::Fail(message)) => Err(PipelineError::Upstream(message.clone())),
            Some(Action::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PipelineError::Upstream("hung call finished".to_string()))
            }
            None => Err(PipelineError::Upstream(format!(
                "no scripted reply for template '{}'",
                request.template
            ))),
        }
    }
}
