//! Method-name matching for journaling.

use dashmap::DashMap;
use regex::Regex;

/// Upper bound on cached verdicts; method names come from client paths.
const MAX_CACHED: usize = 10_000;

/// Matches backend method names against glob patterns (`*` = any run of characters).
#[derive(Debug)]
pub struct MethodMatcher {
    patterns: Vec<Regex>,
    cache: DashMap<String, bool>,
}

impl MethodMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&glob_to_regex(p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            cache: DashMap::new(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, method: &str) -> bool {
        if let Some(hit) = self.cache.get(method) {
            return *hit;
        }
        let verdict = self.patterns.iter().any(|re| re.is_match(method));
        if self.cache.len() < MAX_CACHED {
            self.cache.insert(method.to_string(), verdict);
        }
        verdict
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}
