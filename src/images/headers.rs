use std::collections::BTreeMap;

use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::config::{AppConfig, ConfigError, HeaderRuleConfig};

#[derive(Debug, Clone)]
struct HeaderRule {
    pattern: Regex,
    headers: HeaderMap,
}

/// Outbound request headers: a fixed browser-like base set, plus overrides
/// for hosts that match a configured pattern. Later rules win.
#[derive(Debug, Clone)]
pub struct HeaderRules {
    base: HeaderMap,
    rules: Vec<HeaderRule>,
}

impl HeaderRules {
    pub fn new(
        user_agent: &str,
        base: &BTreeMap<String, String>,
        rules: &[HeaderRuleConfig],
    ) -> Result<Self, ConfigError> {
        let mut base_headers = header_map(base)?;
        base_headers.insert(reqwest::header::USER_AGENT, header_value("User-Agent", user_agent)?);

        let rules = rules
            .iter()
            .map(|rule| {
                let pattern = Regex::new(&rule.pattern).map_err(|source| ConfigError::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    source,
                })?;
                Ok(HeaderRule {
                    pattern,
                    headers: header_map(&rule.headers)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            base: base_headers,
            rules,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(&config.user_agent, &config.fetch_headers, &config.header_rules)
    }

    /// Headers to send when fetching from `host`.
    pub fn headers_for(&self, host: &str) -> HeaderMap {
        let host = host.to_ascii_lowercase();
        let mut headers = self.base.clone();
        for rule in self.rules.iter().filter(|rule| rule.pattern.is_match(&host)) {
            for (name, value) in rule.headers.iter() {
                headers.insert(name.clone(), value.clone());
            }
        }
        headers
    }
}

fn header_map(entries: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    for (name, value) in entries {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(name.clone(), e.to_string()))?;
        headers.insert(header_name, header_value(name, value)?);
    }
    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> HeaderRules {
        HeaderRules::from_config(&AppConfig::default()).unwrap()
    }

    #[test]
    fn known_host_gets_its_referer_and_origin() {
        let headers = rules().headers_for("fastly.picsum.photos");

        assert_eq!(headers["referer"], "https://picsum.photos/");
        assert_eq!(headers["origin"], "https://picsum.photos");
        assert!(headers.contains_key("user-agent"));
    }

    #[test]
    fn unknown_host_keeps_base_headers() {
        let headers = rules().headers_for("example.com");

        assert_eq!(headers["referer"], "https://www.google.com/");
        assert!(!headers.contains_key("origin"));
    }

    #[test]
    fn lookalike_hosts_do_not_match() {
        let headers = rules().headers_for("notunsplash.com.evil.net");
        assert!(!headers.contains_key("origin"));
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let bad = vec![HeaderRuleConfig {
            pattern: "(".to_string(),
            headers: BTreeMap::new(),
        }];
        let err = HeaderRules::new("ua", &BTreeMap::new(), &bad).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn invalid_header_value_is_a_config_error() {
        let mut base = BTreeMap::new();
        base.insert("X-Bad".to_string(), "line\nbreak".to_string());
        assert!(HeaderRules::new("ua", &base, &[]).is_err());
    }
}
