use crate::config::TransferConfig;
use crate::utils::error::{Result, TransferError};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

fn env_placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

impl TransferConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TransferError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from a TOML string, substituting `${VAR}`
    /// placeholders from the process environment first.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content, |name| std::env::var(name).ok());

        toml::from_str(&processed).map_err(|e| TransferError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unknown variables are left as-is so the parse error points at them.
    fn substitute_env_vars<F>(content: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        env_placeholder()
            .replace_all(content, |caps: &Captures| {
                let var_name = &caps[1];
                lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}
