//! Test doubles and builders shared by unit tests.

use crate::error::{AdapterError, GenerationError};
use crate::llm::{GenerationRequest, Generator};
use crate::models::{
    BuildIdea, EnrichedNarrative, NarrativeCandidate, PerSource, ScoredNarrative, Signal,
    SourceKind,
};
use crate::sources::SignalSource;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;

pub fn signal(kind: SourceKind, identity: &str, category: Option<&str>) -> Signal {
    let slug = identity.to_lowercase().replace(' ', "-");
    let mut signal =
        Signal::new(kind, identity, identity).with_url(format!("https://example.com/{}", slug));
    if let Some(category) = category {
        signal = signal.with_category(category);
    }
    signal
}

pub fn candidate(title: &str, category: &str) -> NarrativeCandidate {
    NarrativeCandidate {
        title: title.to_string(),
        description: format!("{} is gaining traction", title),
        category: category.to_string(),
        claimed_evidence: PerSource::default(),
    }
}

pub fn scored(title: &str, category: &str, confidence: u8) -> ScoredNarrative {
    ScoredNarrative {
        narrative_id: format!("narrative_0_{}", title.to_lowercase().replace(' ', "")),
        candidate: candidate(title, category),
        confidence,
        evidence: PerSource::default(),
        sources: Vec::new(),
        first_detected: Utc::now(),
    }
}

pub fn enriched(title: &str, category: &str, confidence: u8) -> EnrichedNarrative {
    EnrichedNarrative {
        scored: scored(title, category, confidence),
        build_ideas: vec![BuildIdea {
            title: format!("{} toolkit", title),
            description: "Developer tooling".to_string(),
            rationale: "Builders need it".to_string(),
        }],
        enrichment_error: None,
    }
}

/// JSON array of `n` build ideas.
pub fn ideas_json(n: usize) -> String {
    let ideas: Vec<serde_json::Value> = (1..=n)
        .map(|i| {
            serde_json::json!({
                "title": format!("Idea {}", i),
                "description": format!("Description {}", i),
                "rationale": format!("Rationale {}", i),
            })
        })
        .collect();
    serde_json::Value::Array(ideas).to_string()
}

type Script = Box<dyn Fn(&str) -> Result<String, GenerationError> + Send + Sync>;

/// Generator answering each prompt with a scripted function.
pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every prompt with the same text.
    pub fn always(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        (self.script)(&request.prompt)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Source returning fixed signals, optionally after a delay.
pub struct StaticSource {
    pub name: String,
    pub kind: SourceKind,
    pub signals: Vec<Signal>,
    pub delay: Option<Duration>,
}

impl StaticSource {
    pub fn new(name: &str, kind: SourceKind, signals: Vec<Signal>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            signals,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SignalSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn detect(&self) -> Result<Vec<Signal>, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.signals.clone())
    }
}

/// Source that always fails.
pub struct FailingSource {
    pub name: String,
    pub kind: SourceKind,
}

impl FailingSource {
    pub fn new(name: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[async_trait]
impl SignalSource for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn detect(&self) -> Result<Vec<Signal>, AdapterError> {
        Err(AdapterError::Status {
            endpoint: format!("https://{}.invalid", self.name),
            status: 503,
        })
    }
}
