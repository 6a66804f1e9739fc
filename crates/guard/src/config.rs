use std::collections::HashMap;

use lock3r_ledger::DEFAULT_RECORD_EXTENSION;
use uuid::Uuid;

use crate::DEFAULT_FAILURE_ID;
use crate::host::FailureDefinitionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub record_extension: String,
    pub establish_on_open: bool,
    pub close_on_corrupt: bool,
    pub failure_id: FailureDefinitionId,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            record_extension: DEFAULT_RECORD_EXTENSION.to_string(),
            establish_on_open: true,
            close_on_corrupt: true,
            failure_id: DEFAULT_FAILURE_ID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl GuardConfig {
    /// Process environment over an optional `KEY=VALUE` file named by
    /// `LOCK3R_CONFIG_PATH`.
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("LOCK3R_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let record_extension = kv
            .get("LOCK3R_RECORD_EXTENSION")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_RECORD_EXTENSION)
            .to_string();
        if record_extension
            .chars()
            .any(|c| c == '.' || c == '/' || c == '\\' || c.is_whitespace())
        {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "LOCK3R_RECORD_EXTENSION must be a bare extension without dots, separators or whitespace"
                    .to_string(),
            });
        }

        let establish_on_open = parse_bool_key(kv, "LOCK3R_ESTABLISH_ON_OPEN", true)?;
        let close_on_corrupt = parse_bool_key(kv, "LOCK3R_CLOSE_ON_CORRUPT", true)?;

        let failure_id = match kv
            .get("LOCK3R_FAILURE_ID")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
        {
            None => DEFAULT_FAILURE_ID,
            Some(raw) => Uuid::parse_str(raw)
                .map(FailureDefinitionId)
                .map_err(|_| StartupError {
                    code: "ERR_INVALID_CONFIG",
                    message: "LOCK3R_FAILURE_ID must be a GUID".to_string(),
                })?,
        };

        Ok(Self {
            record_extension,
            establish_on_open,
            close_on_corrupt,
            failure_id,
        })
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    parse_env_lines(&contents)
}

fn parse_env_lines(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()));
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn parse_bool_key(
    kv: &HashMap<String, String>,
    key: &'static str,
    default: bool,
) -> Result<bool, StartupError> {
    match kv.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => parse_bool(raw).ok_or_else(|| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a boolean", key),
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_env_uses_defaults() {
        let cfg = GuardConfig::from_kv(&HashMap::new()).expect("config should load");
        assert_eq!(cfg, GuardConfig::default());
        assert_eq!(cfg.record_extension, "lock3r");
        assert!(cfg.establish_on_open);
        assert!(cfg.close_on_corrupt);
        assert_eq!(
            cfg.failure_id.to_string(),
            "f04836cc-a698-4bec-9e02-0603d0bd8cf9"
        );
    }

    #[test]
    fn overrides_parse_from_env() {
        let cfg = GuardConfig::from_kv(&env(&[
            ("LOCK3R_RECORD_EXTENSION", " gt "),
            ("LOCK3R_ESTABLISH_ON_OPEN", "0"),
            ("LOCK3R_CLOSE_ON_CORRUPT", "no"),
            ("LOCK3R_FAILURE_ID", "00000000-0000-4000-8000-000000000001"),
        ]))
        .expect("config should load");
        assert_eq!(cfg.record_extension, "gt");
        assert!(!cfg.establish_on_open);
        assert!(!cfg.close_on_corrupt);
        assert_eq!(cfg.failure_id, FailureDefinitionId(Uuid::from_u128(0x4000_8000_0000_0000_0001)));
    }

    #[test]
    fn extension_with_separator_is_rejected() {
        for bad in ["lock.3r", "a/b", "a\\b", "a b"] {
            let err = GuardConfig::from_kv(&env(&[("LOCK3R_RECORD_EXTENSION", bad)])).unwrap_err();
            assert_eq!(err.code, "ERR_INVALID_CONFIG", "`{}` should be rejected", bad);
        }
    }

    #[test]
    fn invalid_bool_and_guid_are_rejected() {
        let err = GuardConfig::from_kv(&env(&[("LOCK3R_CLOSE_ON_CORRUPT", "maybe")])).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
        assert!(err.message.contains("LOCK3R_CLOSE_ON_CORRUPT"));

        let err = GuardConfig::from_kv(&env(&[("LOCK3R_FAILURE_ID", "nope")])).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn env_file_lines_skip_comments_and_strip_quotes() {
        let kv = parse_env_lines("# comment\n\nLOCK3R_RECORD_EXTENSION=\"gt\"\nLOCK3R_CLOSE_ON_CORRUPT = 'false'\n")
            .expect("file should parse");
        assert_eq!(kv.get("LOCK3R_RECORD_EXTENSION").map(String::as_str), Some("gt"));
        assert_eq!(kv.get("LOCK3R_CLOSE_ON_CORRUPT").map(String::as_str), Some("false"));

        let err = parse_env_lines("JUSTAKEY\n").unwrap_err();
        assert_eq!(err.code, "ERR_CONFIG_FILE_PARSE");
        let err = parse_env_lines("=value\n").unwrap_err();
        assert_eq!(err.code, "ERR_CONFIG_FILE_PARSE");
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = parse_env_file("/nonexistent/lock3r.env").unwrap_err();
        assert_eq!(err.code, "ERR_CONFIG_FILE_READ");
    }
}
