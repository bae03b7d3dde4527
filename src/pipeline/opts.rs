/// Option sets passed to the vw executable
///
/// An [`Opts`] is one point of a hyperparameter sweep. Keys are kept sorted, so two
/// option sets with the same entries always serialize to the same command string
/// regardless of insertion order. That string is what the cache hashes.
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Prefix of reserved keys whose value is emitted verbatim, without the key.
pub const RESERVED_PREFIX: char = '#';

/// Reserved key holding a raw base command shared by a sweep.
pub const BASE_KEY: &str = "#base";

/// Reserved key holding a full cache command.
pub const CMD_KEY: &str = "#cmd";

/// Options that change the layout of a vw cache file. Everything else only
/// affects learning and can share the same cache.
const CACHE_OPTIONS: &[&str] = &[
    BASE_KEY,
    CMD_KEY,
    "-b",
    "--bit_precision",
    "--cb_adf",
    "--cb_explore_adf",
    "--ccb_explore_adf",
    "--slates",
    "--json",
    "--dsjson",
    "--compressed",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptValue {
    Null,
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// A repeated option, e.g. `-q UA -q UB`, in the order given.
    List(Vec<OptValue>),
}

impl OptValue {
    fn is_absent(&self) -> bool {
        match self {
            OptValue::Null | OptValue::Flag(false) => true,
            OptValue::List(values) => values.iter().all(OptValue::is_absent),
            _ => false,
        }
    }

    fn is_bare_flag(&self) -> bool {
        match self {
            OptValue::Flag(true) => true,
            OptValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for OptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptValue::Null => Ok(()),
            OptValue::Flag(flag) => write!(f, "{}", flag),
            OptValue::Int(int) => write!(f, "{}", int),
            OptValue::Float(float) => write!(f, "{}", float),
            OptValue::Text(text) => f.write_str(text.trim()),
            OptValue::List(values) => {
                let rendered: Vec<String> = values
                    .iter()
                    .map(ToString::to_string)
                    .filter(|text| !text.is_empty())
                    .collect();
                f.write_str(&rendered.join(" "))
            }
        }
    }
}

impl From<&str> for OptValue {
    fn from(value: &str) -> Self {
        OptValue::Text(value.to_string())
    }
}

impl From<String> for OptValue {
    fn from(value: String) -> Self {
        OptValue::Text(value)
    }
}

impl From<&Path> for OptValue {
    fn from(value: &Path) -> Self {
        OptValue::Text(value.display().to_string())
    }
}

impl From<i64> for OptValue {
    fn from(value: i64) -> Self {
        OptValue::Int(value)
    }
}

impl From<f64> for OptValue {
    fn from(value: f64) -> Self {
        OptValue::Float(value)
    }
}

impl From<bool> for OptValue {
    fn from(value: bool) -> Self {
        OptValue::Flag(value)
    }
}

/// One sweep point: option key to option value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opts(BTreeMap<String, OptValue>);

impl Opts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a vw style option string such as `--cb_adf -l 0.1 --dsjson`.
    ///
    /// A dash-prefixed token followed by a non-option token becomes a key/value
    /// pair, otherwise a flag. Values are kept verbatim as text and repeated
    /// options keep every occurrence. Leading positional tokens are kept under
    /// `#base`.
    pub fn parse(command: &str) -> Self {
        let mut opts = Opts::new();
        let mut positional = Vec::new();
        let mut tokens = command.split_whitespace().peekable();

        while let Some(token) = tokens.next() {
            if !is_option_key(token) {
                positional.push(token);
                continue;
            }
            match tokens.peek() {
                Some(next) if !is_option_key(next) => {
                    opts.append(token, *next);
                    tokens.next();
                }
                _ => opts.append(token, true),
            }
        }

        if !positional.is_empty() {
            opts.insert(BASE_KEY, positional.join(" "));
        }
        opts
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Add a value, turning the entry into a [`OptValue::List`] when `key` is
    /// already present.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<OptValue>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                OptValue::List(values) => values.push(value),
                existing => {
                    let first = std::mem::replace(existing, OptValue::Null);
                    *existing = OptValue::List(vec![first, value]);
                }
            },
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptValue)> {
        self.0.iter()
    }

    /// Copy of these options with the given keys dropped.
    pub fn without(&self, keys: &[&str]) -> Opts {
        self.0
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Human readable job name: the command string without `#base`.
    pub fn job_name(&self) -> String {
        self.without(&[BASE_KEY]).to_string()
    }

    /// Command string restricted to options that shape the vw cache file.
    ///
    /// Sweep points that only differ in learning options map to the same
    /// cache command and therefore share one cache file per input.
    pub fn cache_cmd(&self) -> String {
        self.0
            .iter()
            .filter(|(key, _)| CACHE_OPTIONS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<Opts>()
            .to_string()
    }
}

fn is_option_key(token: &str) -> bool {
    token.starts_with('-') && token.parse::<f64>().is_err()
}

impl fmt::Display for Opts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            if value.is_absent() {
                continue;
            }
            if key.starts_with(RESERVED_PREFIX) {
                let text = value.to_string();
                if !text.is_empty() {
                    parts.push(text);
                }
            } else if let OptValue::List(values) = value {
                for value in values {
                    push_option(&mut parts, key, value);
                }
            } else {
                push_option(&mut parts, key, value);
            }
        }
        // Values may carry their own runs of whitespace (e.g. `#base`).
        let joined = parts.join(" ");
        f.write_str(&joined.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

fn push_option(parts: &mut Vec<String>, key: &str, value: &OptValue) {
    if value.is_absent() {
        return;
    }
    if value.is_bare_flag() {
        parts.push(key.to_string());
    } else {
        parts.push(format!("{} {}", key, value));
    }
}

impl<K: Into<String>, V: Into<OptValue>> FromIterator<(K, V)> for Opts {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Opts(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<OptValue>> Extend<(K, V)> for Opts {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_string_is_canonical() {
        let mut first = Opts::new();
        first.insert("-l", 0.5);
        first.insert("--cb_adf", true);

        let mut second = Opts::new();
        second.insert("--cb_adf", true);
        second.insert("-l", 0.5);

        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.to_string(), "--cb_adf -l 0.5");
    }

    #[test]
    fn test_reserved_keys_emit_value_only() {
        let mut opts = Opts::new();
        opts.insert(BASE_KEY, "--cb_explore_adf   --dsjson");
        opts.insert("--epsilon", 0.1);

        assert_eq!(opts.to_string(), "--cb_explore_adf --dsjson --epsilon 0.1");
        assert_eq!(opts.job_name(), "--epsilon 0.1");
    }

    #[test]
    fn test_absent_values_are_skipped() {
        let mut opts = Opts::new();
        opts.insert("--quiet", false);
        opts.insert("--holdout_off", OptValue::Null);
        opts.insert("--power_t", 0);

        assert_eq!(opts.to_string(), "--power_t 0");
    }

    #[test]
    fn test_parse_option_string() {
        let opts = Opts::parse("--cb_adf -l 0.1 --power_t -0.5 --dsjson -b 18");

        assert_eq!(opts.get("--cb_adf"), Some(&OptValue::Flag(true)));
        assert_eq!(opts.get("-l"), Some(&OptValue::from("0.1")));
        assert_eq!(opts.get("--power_t"), Some(&OptValue::from("-0.5")));
        assert_eq!(opts.get("--dsjson"), Some(&OptValue::Flag(true)));
        assert_eq!(opts.get("-b"), Some(&OptValue::from("18")));
    }

    #[test]
    fn test_parse_keeps_values_verbatim() {
        let opts = Opts::parse("--tag 007 -l 0.10 --min_prediction -inf --power_t nan");

        assert_eq!(
            opts.to_string(),
            "--min_prediction -inf --power_t nan --tag 007 -l 0.10"
        );
    }

    #[test]
    fn test_parse_keeps_repeated_options() {
        let opts = Opts::parse("--cb_adf -q UA -q UB --interactions UAB");

        assert_eq!(
            opts.get("-q"),
            Some(&OptValue::List(vec![OptValue::from("UA"), OptValue::from("UB")]))
        );
        assert_eq!(opts.to_string(), "--cb_adf --interactions UAB -q UA -q UB");
    }

    #[test]
    fn test_repeated_options_get_distinct_cache_keys() {
        let first = Opts::parse("--cb_adf -q UA -q UB");
        let second = Opts::parse("--cb_adf -q UC -q UB");

        assert_ne!(first.to_string(), second.to_string());
        assert_ne!(
            crate::cache::entry_key(&first, None, 1),
            crate::cache::entry_key(&second, None, 1)
        );
    }

    #[test]
    fn test_list_values_from_json() {
        let opts: Opts =
            serde_json::from_str(r#"{"--cb_adf": true, "-q": ["UA", "UB"]}"#).unwrap();

        assert_eq!(opts.to_string(), "--cb_adf -q UA -q UB");
    }

    #[test]
    fn test_cache_cmd_keeps_only_cache_options() {
        let first = Opts::parse("--cb_adf --dsjson -l 0.1");
        let second = Opts::parse("--cb_adf --dsjson -l 0.01 --power_t 0");

        assert_eq!(first.cache_cmd(), "--cb_adf --dsjson");
        assert_eq!(first.cache_cmd(), second.cache_cmd());
    }

    #[test]
    fn test_deserialize_from_json() {
        let opts: Opts =
            serde_json::from_str(r##"{"-l": 0.1, "--cb_adf": true, "#base": "--dsjson", "-b": 18}"##)
                .unwrap();

        assert_eq!(opts.to_string(), "--dsjson --cb_adf -b 18 -l 0.1");
    }
}
