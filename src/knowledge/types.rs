use serde::{Deserialize, Serialize};

/// Retrieved, synthesized context handed to a specialist before generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingContext {
    pub text: String,
    pub sources: Vec<String>,
}

impl GroundingContext {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputMode {
    AnswerSynthesis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveRequest {
    pub messages: Vec<RetrieveMessage>,
    pub output_mode: OutputMode,
    pub include_activity: bool,
}

impl RetrieveRequest {
    pub fn answer_synthesis(query: &str) -> Self {
        Self {
            messages: vec![RetrieveMessage::user(query)],
            output_mode: OutputMode::AnswerSynthesis,
            include_activity: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl RetrieveMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![MessageContent::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveResponse {
    #[serde(default)]
    pub response: Vec<RetrieveMessage>,
    #[serde(default)]
    pub references: Vec<RetrieveReference>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveReference {
    pub id: String,
    #[serde(default)]
    pub doc_key: Option<String>,
}

impl RetrieveReference {
    pub fn citation(&self) -> &str {
        self.doc_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

impl RetrieveResponse {
    pub fn into_grounding(self) -> GroundingContext {
        let text = self
            .response
            .iter()
            .flat_map(|message| message.content.iter())
            .filter_map(|content| match content {
                MessageContent::Text { text } => Some(text.trim()),
                MessageContent::Other => None,
            })
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut sources: Vec<String> = Vec::with_capacity(self.references.len());
        for reference in &self.references {
            let citation = reference.citation();
            if !sources.iter().any(|seen| seen == citation) {
                sources.push(citation.to_string());
            }
        }

        GroundingContext { text, sources }
    }
}
