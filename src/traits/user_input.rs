use anyhow::Result;
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::Mutex;

/// Trait for user input operations to enable testing with mocks
pub trait UserInput: Send + Sync {
    /// Display a confirmation prompt; only an explicit "y" or "yes" confirms
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Interpret a typed confirmation answer
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Real user input implementation using inquire crate
pub struct InquireUserInput;

impl UserInput for InquireUserInput {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        use inquire::Text;
        // A free-text prompt so that anything other than yes declines instead of re-prompting
        let answer = Text::new(prompt).with_help_message("[y/N]").prompt()?;
        Ok(is_affirmative(&answer))
    }
}

/// Mock user input implementation for testing
#[cfg(test)]
pub struct MockUserInput {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockUserInput {
    /// Create new mock with no pre-configured responses
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create mock with pre-configured typed answers
    pub fn with_answers(answers: &[&str]) -> Self {
        let input = Self::new();
        for answer in answers {
            input.add_answer(answer);
        }
        input
    }

    /// Add a typed answer to the queue
    pub fn add_answer(&self, answer: &str) {
        self.responses.lock().unwrap().push_back(answer.to_string());
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Default for MockUserInput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl UserInput for MockUserInput {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let answer = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No more mock responses available"))?;
        Ok(is_affirmative(&answer))
    }
}
