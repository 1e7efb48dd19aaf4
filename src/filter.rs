//! Predicates over PSMs, peptides and proteins.
//!
//! A [`Filter`] pairs a registered [`FilterKind`] (which attribute to read) with a
//! [`FilterComparator`], a threshold and a negation flag. Filters are checked for
//! consistency when they are built, so evaluating one never fails: an entity that
//! lacks the attribute simply does not pass.
use std::borrow::Cow;
use std::fmt::{self, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use regex::Regex;
use thiserror::Error;

use crate::params::Setting;

mod kind;

pub use kind::{FilterKind, FilterLevel, FilterValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterComparator {
    Less,
    LessEqual,
    Equal,
    NotEqual,
    GreaterEqual,
    Greater,
    Contains,
    Regex,
}

const ALL_COMPARATORS: &[FilterComparator] = &[
    FilterComparator::Less,
    FilterComparator::LessEqual,
    FilterComparator::Equal,
    FilterComparator::NotEqual,
    FilterComparator::GreaterEqual,
    FilterComparator::Greater,
    FilterComparator::Contains,
    FilterComparator::Regex,
];

impl FilterComparator {
    pub fn all() -> &'static [FilterComparator] {
        ALL_COMPARATORS
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterEqual => ">=",
            Self::Greater => ">",
            Self::Contains => "contains",
            Self::Regex => "regex",
        }
    }

    /// Whether this comparator can be used on attributes of `value_type`
    pub fn supports(&self, value_type: FilterValueType) -> bool {
        match value_type {
            FilterValueType::Numeric => !matches!(self, Self::Contains | Self::Regex),
            FilterValueType::Boolean => matches!(self, Self::Equal | Self::NotEqual),
            FilterValueType::Text | FilterValueType::TextList => matches!(
                self,
                Self::Equal | Self::NotEqual | Self::Contains | Self::Regex
            ),
        }
    }

    fn compare_numbers(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Less => value < threshold,
            Self::LessEqual => value <= threshold,
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
            Self::GreaterEqual => value >= threshold,
            Self::Greater => value > threshold,
            Self::Contains | Self::Regex => false,
        }
    }
}

impl Display for FilterComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for FilterComparator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" | "less" => Ok(Self::Less),
            "<=" | "less_equal" => Ok(Self::LessEqual),
            "==" | "=" | "equal" => Ok(Self::Equal),
            "!=" | "not_equal" => Ok(Self::NotEqual),
            ">=" | "greater_equal" => Ok(Self::GreaterEqual),
            ">" | "greater" => Ok(Self::Greater),
            "contains" => Ok(Self::Contains),
            "regex" => Ok(Self::Regex),
            _ => Err(FilterError::UnknownComparator(s.to_string())),
        }
    }
}

/// The threshold a filter compares against
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for FilterValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// An attribute value read off an entity for filtering
#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput<'a> {
    Number(f64),
    Flag(bool),
    Text(Cow<'a, str>),
    TextList(Vec<&'a str>),
}

#[derive(Debug, Clone, Error)]
pub enum FilterError {
    #[error("No filter with short name \"{0}\" is registered")]
    UnknownFilter(String),
    #[error("Unknown comparator \"{0}\"")]
    UnknownComparator(String),
    #[error("The comparator {comparator} cannot be used with filter {kind}")]
    IncompatibleComparator {
        kind: FilterKind,
        comparator: FilterComparator,
    },
    #[error("The value {value} does not fit filter {kind}")]
    InvalidValue { kind: FilterKind, value: FilterValue },
    #[error("Filter {0} requires a score name")]
    MissingScoreName(FilterKind),
    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(
        #[from]
        #[source]
        regex::Error,
    ),
}

/// Anything filters can be evaluated on
pub trait Filterable {
    /// Read the attribute `kind` refers to, or `None` if this entity has no such attribute
    fn filter_input(&self, kind: FilterKind, score_name: Option<&str>) -> Option<FilterInput<'_>>;
}

#[derive(Debug, Clone)]
pub struct Filter {
    kind: FilterKind,
    comparator: FilterComparator,
    value: FilterValue,
    negate: bool,
    score_name: Option<String>,
    pattern: Option<Regex>,
}

impl Filter {
    /// Build a filter from the short name of a registered filter kind
    pub fn new<V: Into<FilterValue>>(
        short_name: &str,
        comparator: FilterComparator,
        value: V,
        negate: bool,
    ) -> Result<Self, FilterError> {
        let kind = FilterKind::from_short_name(short_name)
            .ok_or_else(|| FilterError::UnknownFilter(short_name.to_string()))?;
        Self::from_kind(kind, comparator, value.into(), negate, None)
    }

    /// A filter on a named PSM score
    pub fn psm_score<S: Into<String>>(
        score_name: S,
        comparator: FilterComparator,
        value: f64,
        negate: bool,
    ) -> Result<Self, FilterError> {
        Self::from_kind(
            FilterKind::PsmScore,
            comparator,
            FilterValue::Number(value),
            negate,
            Some(score_name.into()),
        )
    }

    pub fn from_kind(
        kind: FilterKind,
        comparator: FilterComparator,
        value: FilterValue,
        negate: bool,
        score_name: Option<String>,
    ) -> Result<Self, FilterError> {
        let value_type = kind.value_type();
        if !comparator.supports(value_type) {
            return Err(FilterError::IncompatibleComparator { kind, comparator });
        }
        let fits = matches!(
            (value_type, &value),
            (FilterValueType::Numeric, FilterValue::Number(_))
                | (FilterValueType::Boolean, FilterValue::Flag(_))
                | (FilterValueType::Text, FilterValue::Text(_))
                | (FilterValueType::TextList, FilterValue::Text(_))
        );
        if !fits {
            return Err(FilterError::InvalidValue { kind, value });
        }
        if kind.needs_score_name() && score_name.as_deref().map_or(true, str::is_empty) {
            return Err(FilterError::MissingScoreName(kind));
        }
        let pattern = match (&comparator, &value) {
            (FilterComparator::Regex, FilterValue::Text(p)) => Some(Regex::new(p)?),
            _ => None,
        };
        Ok(Self {
            kind,
            comparator,
            value,
            negate,
            score_name,
            pattern,
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn level(&self) -> FilterLevel {
        self.kind.level()
    }

    pub fn comparator(&self) -> FilterComparator {
        self.comparator
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn score_name(&self) -> Option<&str> {
        self.score_name.as_deref()
    }

    fn matches_text(&self, text: &str) -> bool {
        match (&self.comparator, &self.value) {
            (FilterComparator::Equal, FilterValue::Text(v)) => text == v,
            (FilterComparator::NotEqual, FilterValue::Text(v)) => text != v,
            (FilterComparator::Contains, FilterValue::Text(v)) => text.contains(v.as_str()),
            (FilterComparator::Regex, _) => self
                .pattern
                .as_ref()
                .map(|p| p.is_match(text))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Evaluate the filter on `entity`
    pub fn apply<E: Filterable + ?Sized>(&self, entity: &E) -> bool {
        let input = match entity.filter_input(self.kind, self.score_name.as_deref()) {
            Some(input) => input,
            None => return false,
        };
        let passes = match (&input, &self.value) {
            (FilterInput::Number(x), FilterValue::Number(t)) => {
                self.comparator.compare_numbers(*x, *t)
            }
            (FilterInput::Flag(x), FilterValue::Flag(t)) => match self.comparator {
                FilterComparator::Equal => x == t,
                FilterComparator::NotEqual => x != t,
                _ => false,
            },
            (FilterInput::Text(text), FilterValue::Text(_)) => self.matches_text(text),
            (FilterInput::TextList(items), FilterValue::Text(_)) => match self.comparator {
                FilterComparator::NotEqual => {
                    items.iter().all(|item| self.matches_text(item))
                }
                _ => items.iter().any(|item| self.matches_text(item)),
            },
            _ => return false,
        };
        passes != self.negate
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("NOT ")?;
        }
        match &self.score_name {
            Some(score) => write!(f, "{}[{}]", self.kind, score)?,
            None => write!(f, "{}", self.kind)?,
        }
        write!(f, " {} {}", self.comparator, self.value)
    }
}

/// Evaluate every filter on `entity`, passing only if all of them pass
pub fn apply_all<E: Filterable + ?Sized>(filters: &[Filter], entity: &E) -> bool {
    filters.iter().all(|f| f.apply(entity))
}

/// Setting id of the filter kind
pub const FILTER_KIND: &str = "filter";
/// Setting id of the filter comparator
pub const FILTER_COMPARATOR: &str = "comparator";

/// The filters of `level` as a setting offering their short names
pub fn filter_kind_setting(level: FilterLevel) -> Setting<String> {
    let params: IndexMap<String, String> = FilterKind::all()
        .iter()
        .filter(|k| level.contains(k.level()))
        .map(|k| (k.short_name().to_string(), k.name().to_string()))
        .collect();
    Setting::new(FILTER_KIND, "Filter", None, params, true)
}

/// The comparators usable with `kind` as a setting offering their symbols
pub fn comparator_setting(kind: FilterKind) -> Setting<FilterComparator> {
    let params: IndexMap<String, String> = kind
        .permitted_comparators()
        .into_iter()
        .map(|c| (c.symbol().to_string(), format!("{} {c}", kind.name())))
        .collect();
    Setting::new(FILTER_COMPARATOR, "Comparator", None, params, true)
}
