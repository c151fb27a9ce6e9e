use serde::Deserialize;
use serde::Serialize;

use crate::analysis::AnalysisResult;

/// Body of `POST {base_url}/analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub idea: String,
    pub what_ifs: Vec<String>,
    pub thread_id: String,
}

/// One line of the streamed analysis response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEnvelope {
    Log { message: String },
    ChatMessage { message: String },
    Result { data: AnalysisResult },
    Error { message: String },
}

impl StreamEnvelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Log { .. } => "log",
            Self::ChatMessage { .. } => "chat_message",
            Self::Result { .. } => "result",
            Self::Error { .. } => "error",
        }
    }
}
