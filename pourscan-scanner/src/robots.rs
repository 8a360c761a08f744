use crate::error::Result;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone)]
struct RobotsRule {
    allow: bool,
    pattern: String,
    regex: Regex,
}

/// Allow/Disallow rules from a robots.txt that apply to the generic `*` agent.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    rules: Vec<RobotsRule>,
}

impl RobotsRules {
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        let mut agents: Vec<String> = Vec::new();
        let mut group_has_rules = false;

        for line in text.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if group_has_rules {
                        agents.clear();
                        group_has_rules = false;
                    }
                    agents.push(value.to_ascii_lowercase());
                }
                directive @ ("allow" | "disallow") => {
                    group_has_rules = true;
                    if value.is_empty() || !agents.iter().any(|a| a == "*") {
                        continue;
                    }
                    if let Some(rule) = RobotsRule::new(directive == "allow", value) {
                        rules.push(rule);
                    }
                }
                _ => {}
            }
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Longest matching rule wins; `Allow` wins a tie. No match means allowed.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return true;
        };
        let target = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };

        let mut best: Option<&RobotsRule> = None;
        for rule in &self.rules {
            if !rule.regex.is_match(&target) {
                continue;
            }
            best = match best {
                Some(current)
                    if current.pattern.len() > rule.pattern.len()
                        || (current.pattern.len() == rule.pattern.len() && current.allow) =>
                {
                    Some(current)
                }
                _ => Some(rule),
            };
        }

        best.map(|rule| rule.allow).unwrap_or(true)
    }
}

impl RobotsRule {
    fn new(allow: bool, pattern: &str) -> Option<Self> {
        let (body, anchored) = match pattern.strip_suffix('$') {
            Some(body) => (body, true),
            None => (pattern, false),
        };
        let mut expr = format!("^{}", regex::escape(body).replace(r"\*", ".*"));
        if anchored {
            expr.push('$');
        }
        let regex = Regex::new(&expr).ok()?;
        Some(Self {
            allow,
            pattern: pattern.to_string(),
            regex,
        })
    }
}

/// Download and parse `<origin>/robots.txt`.
///
/// A missing or non-success robots.txt means no restriction (`Ok(None)`).
/// Transport failures are returned so the caller can log and degrade.
pub async fn fetch_robots(client: &Client, origin: &Url) -> Result<Option<RobotsRules>> {
    let robots_url = origin
        .join("/robots.txt")
        .map_err(|e| crate::ScanError::InvalidUrl(format!("{}: {}", origin, e)))?;

    debug!("Fetching {}", robots_url);
    let response = client.get(robots_url.as_str()).send().await?;

    if !response.status().is_success() {
        info!(
            "No robots.txt at {} (status {}), crawling unrestricted",
            robots_url,
            response.status().as_u16()
        );
        return Ok(None);
    }

    let body = response.text().await?;
    let rules = RobotsRules::parse(&body);
    info!("Loaded {} robots rule(s) from {}", rules.rules.len(), robots_url);
    Ok(Some(rules))
}
