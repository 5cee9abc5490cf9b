#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub role: Role,
    pub text: String,
}

/// Ordered, append-only conversation shown beside the draft. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
}

impl MessageLog {
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.entries.push(LogEntry {
            role: Role::User,
            text: text.into(),
        });
    }

    /// Appends an assistant message unless it repeats the most recent assistant entry.
    ///
    /// Returns whether the message was appended.
    pub fn push_assistant(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let last_assistant = self
            .entries
            .iter()
            .rev()
            .find(|entry| entry.role == Role::Assistant);
        if last_assistant.is_some_and(|entry| entry.text == text) {
            return false;
        }

        self.entries.push(LogEntry {
            role: Role::Assistant,
            text: text.to_string(),
        });
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
