use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An expression contained a character the tokenizer does not recognise.
    #[error("Unexpected character '{ch}' at position {position} in expression '{expression}'.")]
    Lexical { expression: String, position: usize, ch: char },

    /// Unbalanced parentheses, trailing tokens or a missing operand.
    #[error("Syntax error: {0}.")]
    Syntax(String),

    #[error("Unknown transformer '{0}'.")]
    UnknownTransformer(String),

    #[error("Unknown resolver '@{0}'.")]
    UnknownResolver(String),

    #[error("Unknown function '{0}'.")]
    UnknownFunction(String),

    #[error("Failed to load include '{path}'. Original error: {message}")]
    IncludeLoad { path: String, message: String },

    /// The target of an `#each` block did not resolve to an array.
    #[error("Loop target '{expression}' is not an array (found {found}).")]
    LoopTarget { expression: String, found: String },

    #[error("Transformer '{name}' failed: {message}")]
    Transformer { name: String, message: String },

    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },

    /// Top-level wrapper so callers can diagnose a failed render without the
    /// template content being echoed back.
    #[error("Failed to render template of length {template_length} with context keys [{}]. Original error: {source}", context_keys.join(", "))]
    Render {
        template_length: usize,
        context_keys: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}.")]
    Config(String),

    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}.")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}.")]
    YamlError(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Returns the innermost error when this one is a [`Error::Render`] wrapper.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Render { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Convenience type alias for Results with the crate error as the error type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Default error handler that prints the error and exits the program.
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(crate::constants::exit_codes::FAILURE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_lists_context_keys() {
        let err = Error::Render {
            template_length: 12,
            context_keys: vec!["a".into(), "b".into()],
            source: Box::new(Error::UnknownTransformer("bogus".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("length 12"));
        assert!(msg.contains("[a, b]"));
        assert!(matches!(err.root_cause(), Error::UnknownTransformer(name) if name == "bogus"));
    }

    #[test]
    fn lexical_error_message() {
        let err = Error::Lexical { expression: "a # b".into(), position: 2, ch: '#' };
        assert_eq!(
            err.to_string(),
            "Unexpected character '#' at position 2 in expression 'a # b'."
        );
    }
}
