use crate::error::ConfigError;
use std::{collections::HashMap, fs, path::Path};

pub const SERVICE_NAME_VAR: &str = "JANIS_SERVICE_NAME";
pub const BUCKET_VAR: &str = "S3_DATA_LAKE_RAW_BUCKET";
pub const QUEUE_VAR: &str = "DATA_LAKE_SYNC_SQS_QUEUE_URL";
pub const STATE_PATH_VAR: &str = "DATA_LAKE_STATE_PATH";

/// Process environment plus whatever a `.env` file adds on top.
#[derive(Debug, Clone, Default)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    /// Snapshot of the system environment.
    pub fn from_system() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Loads `KEY=VALUE` lines; file values win over the system ones.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.parse_env_content(&content)
    }

    /// Non-empty value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::EnvFile(format!(
                    "malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::EnvFile(format!(
                    "empty key at line {}",
                    line_num + 1
                )));
            }
            self.vars.insert(key.to_string(), unquote(value.trim()));
        }
        Ok(())
    }
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_env_file_over_existing_vars() {
        let mut env = EnvManager::from_pairs([(BUCKET_VAR, "from-system"), (QUEUE_VAR, "q")]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "# data lake\n{BUCKET_VAR}=\"raw-bucket\"\nexport {SERVICE_NAME_VAR}='order'\n\nEMPTY="
        )
        .unwrap();

        env.load_from_file(file.path()).unwrap();
        assert_eq!(env.get(BUCKET_VAR), Some("raw-bucket"));
        assert_eq!(env.get(SERVICE_NAME_VAR), Some("order"));
        assert_eq!(env.get(QUEUE_VAR), Some("q"));
        assert_eq!(env.get("EMPTY"), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        let mut env = EnvManager::default();
        assert!(env.parse_env_content("NOT A PAIR").is_err());
        assert!(env.parse_env_content("=value").is_err());
    }
}
