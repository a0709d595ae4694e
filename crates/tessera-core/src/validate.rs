//! Value validation used by declared action inputs.
//!
//! [`Validate::is`] checks a value against a rule name. Rules are looked up
//! in this order: custom rules registered with [`Validate::extend`], the
//! built-in checks, named patterns, and finally the rule itself compiled as a
//! regular expression. A bare pattern is anchored (`^...$`); a pattern in
//! slashes (`/.../i`) is used as written with its flags.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use tessera_router::text;

type RuleFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type FilterFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("alpha", r"^[A-Za-z]+$"),
    ("alphaNum", r"^[A-Za-z0-9]+$"),
    ("alphaDash", r"^[A-Za-z0-9\-_]+$"),
    ("chs", r"^[\x{4e00}-\x{9fa5}]+$"),
    ("chsAlpha", r"^[\x{4e00}-\x{9fa5}a-zA-Z]+$"),
    ("chsAlphaNum", r"^[\x{4e00}-\x{9fa5}a-zA-Z0-9]+$"),
    ("chsDash", r"^[\x{4e00}-\x{9fa5}a-zA-Z0-9_\-]+$"),
    ("mobile", r"^1[3-9][0-9]\d{8}$"),
    (
        "idCard",
        r"(^[1-9]\d{5}(18|19|([23]\d))\d{2}((0[1-9])|(10|11|12))(([0-2][1-9])|10|20|30|31)\d{3}[0-9Xx]$)|(^[1-9]\d{5}\d{2}((0[1-9])|(10|11|12))(([0-2][1-9])|10|20|30|31)\d{2}$)",
    ),
    ("zip", r"^\d{6}$"),
    ("email", r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$"),
    ("macAddr", r"^([0-9A-Fa-f]{2}[:\-]){5}[0-9A-Fa-f]{2}$"),
];

/// Rule and filter registry.
pub struct Validate {
    rules: HashMap<String, RuleFn>,
    patterns: HashMap<String, Regex>,
    filters: HashMap<String, FilterFn>,
    compiled: RwLock<HashMap<String, Option<Regex>>>,
}

impl Validate {
    /// Creates a registry with the built-in patterns.
    #[must_use]
    pub fn new() -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| ((*name).to_string(), re)))
            .collect();
        Self {
            rules: HashMap::new(),
            patterns,
            filters: HashMap::new(),
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a custom rule, overriding any built-in rule of that name.
    pub fn extend<F>(&mut self, name: impl Into<String>, rule: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(rule));
    }

    /// Registers a named pattern.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the pattern does not compile.
    pub fn pattern(&mut self, name: impl Into<String>, pattern: &str) -> Result<(), regex::Error> {
        self.patterns.insert(name.into(), Regex::new(pattern)?);
        Ok(())
    }

    /// Registers a named filter.
    pub fn filter<F>(&mut self, name: impl Into<String>, filter: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.filters.insert(name.into(), Arc::new(filter));
    }

    /// Checks a value against a rule.
    #[must_use]
    pub fn is(&self, value: &str, rule: &str) -> bool {
        if let Some(custom) = self.rules.get(rule) {
            return custom(value);
        }
        match rule {
            "require" => !value.is_empty(),
            "accepted" => matches!(value, "1" | "on" | "yes" | "true"),
            "date" => text::is_date(value),
            "boolean" | "bool" => matches!(value, "0" | "1" | "true" | "false"),
            "number" | "digit" => !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
            "integer" | "int" => value.parse::<i64>().is_ok(),
            "float" => value.parse::<f64>().is_ok_and(f64::is_finite),
            "ip" => value.parse::<IpAddr>().is_ok(),
            "ipv4" => value.parse::<std::net::Ipv4Addr>().is_ok(),
            "ipv6" => value.parse::<std::net::Ipv6Addr>().is_ok(),
            "url" => url::Url::parse(value).is_ok_and(|u| u.has_host()),
            "alnum" => ctype(value, char::is_alphanumeric),
            "lower" => ctype(value, char::is_lowercase),
            "upper" => ctype(value, char::is_uppercase),
            "space" => ctype(value, char::is_whitespace),
            "xdigit" => ctype(value, |c| c.is_ascii_hexdigit()),
            "punct" => ctype(value, |c| c.is_ascii_punctuation()),
            "cntrl" => ctype(value, char::is_control),
            _ => match self.patterns.get(rule) {
                Some(pattern) => pattern.is_match(value),
                None => self.raw_match(value, rule),
            },
        }
    }

    /// Checks the character length of a value.
    ///
    /// `"n"` requires exactly n characters, `"n,"` at least n and `"n,m"`
    /// between n and m inclusive. Malformed rules never match.
    #[must_use]
    pub fn length(&self, value: &str, rule: &str) -> bool {
        let length = value.chars().count();
        match rule.split_once(',') {
            Some((min, max)) => {
                let Ok(min) = min.trim().parse::<usize>() else {
                    return false;
                };
                let max = max.trim();
                if max.is_empty() {
                    length >= min
                } else {
                    max.parse::<usize>().is_ok_and(|max| (min..=max).contains(&length))
                }
            }
            None => rule.trim().parse::<usize>().is_ok_and(|exact| exact == length),
        }
    }

    /// Applies a filter.
    ///
    /// Registered and built-in filters transform the value. Any other name is
    /// treated as a rule: the value passes through unchanged when it matches
    /// and `None` is returned when it does not.
    #[must_use]
    pub fn apply_filter(&self, value: &str, filter: &str) -> Option<String> {
        if let Some(custom) = self.filters.get(filter) {
            return Some(custom(value));
        }
        match filter {
            "trim" => Some(value.trim().to_string()),
            "lower" | "strtolower" => Some(value.to_lowercase()),
            "upper" | "strtoupper" => Some(value.to_uppercase()),
            "strip_tags" => Some(text::strip_tags(value)),
            "int" | "intval" => Some(leading_integer(value).to_string()),
            "htmlspecialchars" => Some(escape_html(value)),
            rule => self.is(value, rule).then(|| value.to_string()),
        }
    }

    fn raw_match(&self, value: &str, rule: &str) -> bool {
        if let Some(cached) = self.compiled.read().get(rule) {
            return cached.as_ref().is_some_and(|re| re.is_match(value));
        }
        let compiled = compile_rule(rule);
        let matched = compiled.as_ref().is_some_and(|re| re.is_match(value));
        self.compiled.write().insert(rule.to_string(), compiled);
        matched
    }
}

impl Default for Validate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Validate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validate")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("patterns", &self.patterns.keys().collect::<Vec<_>>())
            .field("filters", &self.filters.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn ctype(value: &str, probe: impl Fn(char) -> bool) -> bool {
    !value.is_empty() && value.chars().all(probe)
}

fn compile_rule(rule: &str) -> Option<Regex> {
    if let Some(body) = rule.strip_prefix('/') {
        if let Some(end) = body.rfind('/') {
            let (pattern, flags) = (&body[..end], &body[end + 1..]);
            let flags: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
            let full = if flags.is_empty() {
                pattern.to_string()
            } else {
                format!("(?{flags}){pattern}")
            };
            return Regex::new(&full).ok();
        }
    }
    Regex::new(&format!("^(?:{rule})$")).ok()
}

fn leading_integer(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let mut end = 0;
    for (index, c) in trimmed.char_indices() {
        if c.is_ascii_digit() || (index == 0 && (c == '-' || c == '+')) {
            end = index + c.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse().unwrap_or(0)
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}
