//! Credential resolution: explicit flag first, then the environment,
//! then a `.env` file loaded via dotenvy.

use crate::{Error, Result};

/// Resolve an API credential. The explicit value always wins; otherwise the
/// named environment variable is consulted, with a `.env` fallback. Fails
/// with a remediation hint naming both the flag and the variable.
pub fn resolve(
    explicit: Option<&str>,
    env_var: &'static str,
    flag: &'static str,
) -> Result<String> {
    if let Some(value) = pick(explicit, std::env::var(env_var).ok().as_deref()) {
        return Ok(value);
    }
    if dotenvy::dotenv().is_ok() {
        if let Some(value) = non_empty(std::env::var(env_var).ok().as_deref()) {
            return Ok(value);
        }
    }
    Err(Error::MissingCredential { flag, env_var })
}

/// Pure resolution order: explicit beats environment, empty counts as unset.
fn pick(explicit: Option<&str>, env_value: Option<&str>) -> Option<String> {
    non_empty(explicit).or_else(|| non_empty(env_value))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_value_wins_over_environment() {
        assert_eq!(
            pick(Some("from-flag"), Some("from-env")),
            Some("from-flag".to_string())
        );
    }

    #[test]
    fn environment_used_when_no_explicit_value() {
        assert_eq!(pick(None, Some("from-env")), Some("from-env".to_string()));
    }

    #[test]
    fn blank_explicit_value_falls_through() {
        assert_eq!(pick(Some("   "), Some("from-env")), Some("from-env".to_string()));
    }

    #[test]
    fn nothing_resolves_to_none() {
        assert_eq!(pick(None, None), None);
    }

    #[test]
    fn resolve_reports_missing_credential() {
        let err = resolve(None, "MEDIAGEN_TEST_UNSET_VAR", "--api-token").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--api-token"));
        assert!(msg.contains("MEDIAGEN_TEST_UNSET_VAR"));
    }

    #[test]
    fn resolve_prefers_explicit_over_env() {
        std::env::set_var("MEDIAGEN_TEST_TOKEN", "from-env");
        let got = resolve(Some("from-flag"), "MEDIAGEN_TEST_TOKEN", "--api-token").unwrap();
        assert_eq!(got, "from-flag");
    }
}
