use std::env;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub timeout_ms: u64,
    pub max_msg_bytes: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            max_msg_bytes: 1_000_000,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unparseable numbers keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("READTRACK_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                cfg.timeout_ms = n;
            }
        }
        if let Some(v) = lookup("READTRACK_MAX_BYTES") {
            if let Ok(n) = v.parse() {
                cfg.max_msg_bytes = n;
            }
        }
        if let Some(v) = lookup("READTRACK_LOG") {
            cfg.log_level = v;
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_and_bad_values() {
        let cfg = ServerConfig::from_lookup(|k| match k {
            "READTRACK_TIMEOUT_MS" => Some("50".into()),
            "READTRACK_MAX_BYTES" => Some("lots".into()),
            "READTRACK_LOG" => Some("debug".into()),
            _ => None,
        });
        assert_eq!(cfg.timeout_ms, 50);
        assert_eq!(cfg.max_msg_bytes, 1_000_000);
        assert_eq!(cfg.log_level, "debug");
    }
}
