/// Prompt printed before every read.
pub const DEFAULT_PROMPT: &str = ">>> ";

/// Banner printed once when a session starts.
pub const DEFAULT_BANNER: &str = "Enter \"info\" for commands list.\nEnter \"exit\" to close.\n\n";

/// Presentation settings of an interpreter session.
///
/// Fields are public; start from [`Config::default`] and override what you need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Text shown before each line is read.
    pub prompt: String,
    /// Text written once at the start of [`crate::Interpreter::run`]; `None` disables it.
    pub banner: Option<String>,
}

impl Config {
    /// Default settings without the startup banner.
    pub fn quiet() -> Self {
        Self {
            banner: None,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            banner: Some(DEFAULT_BANNER.to_string()),
        }
    }
}
