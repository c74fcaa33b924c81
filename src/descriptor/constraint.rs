use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use regex::Regex;
use serde_json::Value;

/// A predicate layered on top of a base descriptor.
///
/// `check` returns the human description of the constraint on failure; the
/// caller attaches the field path and the offending value.
#[derive(Clone)]
pub enum Constraint {
    /// Anchored regex over string values.
    Pattern { regex: Regex, description: String },
    /// Character count for strings, item count for arrays and maps.
    Length { min: Option<usize>, max: Option<usize> },
    /// Inclusive numeric bounds.
    Range { min: Option<f64>, max: Option<f64> },
    /// String membership set.
    OneOf(BTreeSet<String>),
    /// Numeric membership set.
    OneOfNumbers(BTreeSet<OrderedFloat<f64>>),
    Predicate {
        description: String,
        check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
    },
}

impl Constraint {
    pub fn pattern(regex: Regex, description: impl Into<String>) -> Self {
        Self::Pattern { regex, description: description.into() }
    }

    pub fn length(min: usize, max: usize) -> Self {
        Self::Length { min: Some(min), max: Some(max) }
    }

    pub fn min_length(min: usize) -> Self {
        Self::Length { min: Some(min), max: None }
    }

    pub fn max_length(max: usize) -> Self {
        Self::Length { min: None, max: Some(max) }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Self::Range { min: Some(min), max: Some(max) }
    }

    pub fn at_least(min: f64) -> Self {
        Self::Range { min: Some(min), max: None }
    }

    pub fn one_of<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(allowed.into_iter().map(Into::into).collect())
    }

    pub fn one_of_numbers<I>(allowed: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        Self::OneOfNumbers(allowed.into_iter().map(OrderedFloat).collect())
    }

    pub fn predicate<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate { description: description.into(), check: Arc::new(check) }
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::Pattern { regex, description } => match value.as_str() {
                Some(s) if regex.is_match(s) => Ok(()),
                _ => Err(description.clone()),
            },
            Self::Length { min, max } => {
                let len = match value {
                    Value::String(s) => s.chars().count(),
                    Value::Array(xs) => xs.len(),
                    Value::Object(m) => m.len(),
                    _ => return Err(self.describe()),
                };
                let too_short = min.is_some_and(|m| len < m);
                let too_long = max.is_some_and(|m| len > m);
                if too_short || too_long { Err(self.describe()) } else { Ok(()) }
            }
            Self::Range { min, max } => {
                let Some(n) = value.as_f64() else {
                    return Err(self.describe());
                };
                let below = min.is_some_and(|m| n < m);
                let above = max.is_some_and(|m| n > m);
                if below || above { Err(self.describe()) } else { Ok(()) }
            }
            Self::OneOf(allowed) => match value.as_str() {
                Some(s) if allowed.contains(s) => Ok(()),
                _ => Err(self.describe()),
            },
            Self::OneOfNumbers(allowed) => match value.as_f64() {
                Some(n) if allowed.contains(&OrderedFloat(n)) => Ok(()),
                _ => Err(self.describe()),
            },
            Self::Predicate { description, check } => {
                if check(value) { Ok(()) } else { Err(description.clone()) }
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Pattern { description, .. } | Self::Predicate { description, .. } => {
                description.clone()
            }
            Self::Length { min: Some(lo), max: Some(hi) } => {
                format!("length must be between {lo} and {hi}")
            }
            Self::Length { min: Some(lo), max: None } => format!("length must be at least {lo}"),
            Self::Length { min: None, max: Some(hi) } => format!("length must be at most {hi}"),
            Self::Length { .. } => "length is unconstrained".to_string(),
            Self::Range { min: Some(lo), max: Some(hi) } => {
                format!("must be between {} and {}", fmt_num(*lo), fmt_num(*hi))
            }
            Self::Range { min: Some(lo), max: None } => {
                format!("must be at least {}", fmt_num(*lo))
            }
            Self::Range { min: None, max: Some(hi) } => format!("must be at most {}", fmt_num(*hi)),
            Self::Range { .. } => "must be a number".to_string(),
            Self::OneOf(allowed) => {
                let list = allowed.iter().cloned().collect::<Vec<_>>().join(", ");
                format!("must be one of [{list}]")
            }
            Self::OneOfNumbers(allowed) => {
                let list = allowed.iter().map(|n| fmt_num(n.0)).collect::<Vec<_>>().join(", ");
                format!("must be one of [{list}]")
            }
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern { regex, .. } => write!(f, "Pattern({})", regex.as_str()),
            other => write!(f, "{}", other.describe()),
        }
    }
}

// prefer integers when exact
fn fmt_num(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}
