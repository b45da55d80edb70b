//! User-cancellable outcomes and the modal prompt capability.

/// Result of an interaction the user may back out of.
///
/// Cancelling is an expected outcome, not a fault, so it is a variant here
/// rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Value(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Cancelled => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Value(v) => Outcome::Value(f(v)),
            Self::Cancelled => Outcome::Cancelled,
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Cancelled,
        }
    }
}

/// Asks the user for a line of text.
pub trait Prompter {
    /// Show a prompt titled `title`. Implementations keep asking until the
    /// answer matches `validation_pattern` (a regex) or the user cancels.
    fn prompt_user(&self, title: &str, validation_pattern: &str) -> Outcome<String>;
}

/// Replays canned answers, in order. `None` entries cancel.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: parking_lot::Mutex<std::collections::VecDeque<Option<String>>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            answers: parking_lot::Mutex::new(
                answers.into_iter().map(|a| a.map(Into::into)).collect(),
            ),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt_user(&self, _title: &str, validation_pattern: &str) -> Outcome<String> {
        let Ok(pattern) = regex::Regex::new(validation_pattern) else {
            return Outcome::Cancelled;
        };
        let mut answers = self.answers.lock();
        while let Some(answer) = answers.pop_front() {
            match answer {
                Some(text) if pattern.is_match(&text) => return Outcome::Value(text),
                Some(_) => continue,
                None => return Outcome::Cancelled,
            }
        }
        Outcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_option() {
        assert_eq!(Outcome::from(Some(3)), Outcome::Value(3));
        assert!(Outcome::<u8>::from(None).is_cancelled());
        assert_eq!(Outcome::Value(2).map(|v| v * 2).value(), Some(4));
    }

    #[test]
    fn test_scripted_prompter_skips_invalid_answers() {
        let prompter = ScriptedPrompter::new([Some("nope!"), Some("0x1101")]);
        assert_eq!(
            prompter.prompt_user("UUID", r"^(0x)?[0-9a-f]+$"),
            Outcome::Value("0x1101".to_string())
        );
        assert!(prompter.prompt_user("UUID", ".*").is_cancelled());
    }

    #[test]
    fn test_scripted_prompter_cancel() {
        let prompter = ScriptedPrompter::new([None::<&str>, Some("late")]);
        assert!(prompter.prompt_user("UUID", ".*").is_cancelled());
    }
}
