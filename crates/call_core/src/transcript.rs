use chrono::{DateTime, Local};

pub const TRANSCRIPT_PLACEHOLDER: &str = "Waiting for conversation to begin...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub received_at: DateTime<Local>,
    pub text: String,
}

impl TranscriptFragment {
    pub fn line(&self) -> String {
        format!("[{}] {}", self.received_at.format("%H:%M:%S"), self.text)
    }
}

/// Append-only transcript of the call currently in flight.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    fragments: Vec<TranscriptFragment>,
}

impl Transcript {
    pub fn push(&mut self, text: impl Into<String>) -> &TranscriptFragment {
        self.push_at(Local::now(), text)
    }

    pub fn push_at(
        &mut self,
        received_at: DateTime<Local>,
        text: impl Into<String>,
    ) -> &TranscriptFragment {
        self.fragments.push(TranscriptFragment {
            received_at,
            text: text.into(),
        });
        &self.fragments[self.fragments.len() - 1]
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    pub fn fragments(&self) -> &[TranscriptFragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn render(&self) -> String {
        if self.fragments.is_empty() {
            return TRANSCRIPT_PLACEHOLDER.to_string();
        }
        self.fragments
            .iter()
            .map(|fragment| format!("{}\n", fragment.line()))
            .collect()
    }
}
