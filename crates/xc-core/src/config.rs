//! Environment switches read by the compiler configuration.

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

pub fn env_true(key: &str) -> Option<bool> {
    env_value(key).map(|val| !matches!(val.as_str(), "0" | "false" | "FALSE" | "False"))
}

pub fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

pub fn usize_from_env(key: &str) -> Option<usize> {
    let raw = env_value(key)?;
    match raw.parse::<usize>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!("ignoring {}={:?}: {}", key, raw, err);
            None
        }
    }
}

pub const ENV_MAX_SWEEPS: &str = "XC_MAX_SWEEPS";
pub const ENV_MAX_ERRORS: &str = "XC_MAX_ERRORS";
pub const ENV_WARN_UNREACHABLE: &str = "XC_WARN_UNREACHABLE";
pub const ENV_VERBOSE: &str = "XC_VERBOSE";
