//! Named, enumerable configuration values.
//!
//! Every configurable piece of the pipeline (protein scoring strategies, inference
//! strategies) exposes its knobs as [`Setting`]s so a caller can list them, read the
//! legal values and change them by id without knowing the concrete strategy type.
use std::fmt::{self, Display};
use std::str::FromStr;

use indexmap::IndexMap;
use thiserror::Error;

/// Errors raised when configuring a [`Setting`] through a [`SettingLike`] surface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("No setting with id \"{0}\" is known")]
    UnknownSetting(String),
    #[error("\"{value}\" is not a permitted value for setting \"{setting}\"")]
    InvalidValue { setting: String, value: String },
}

/// The type-erased view of a [`Setting`], analogous to how a controlled vocabulary
/// parameter is exposed independent of its value type.
pub trait SettingLike {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    /// The current value rendered as its short name, if one is set
    fn value_str(&self) -> Option<String>;

    /// Mapping from permitted short value to a human readable label
    fn permitted_values(&self) -> &IndexMap<String, String>;

    /// Parse and store a new value
    fn set_value_str(&mut self, value: &str) -> Result<(), SettingError>;

    fn is_permitted(&self, value: &str) -> bool {
        self.permitted_values().contains_key(value)
    }

    fn label_of(&self, value: &str) -> Option<&str> {
        self.permitted_values().get(value).map(|s| s.as_str())
    }
}

/// A named, typed configuration value with an enumerable set of legal values.
///
/// When `restricted` is `false`, the permitted value map is advisory: it lists the
/// values known right now (e.g. the scores observed so far) but any value that
/// parses as `T` is accepted.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Setting<T> {
    pub id: String,
    pub name: String,
    pub value: Option<T>,
    pub params: IndexMap<String, String>,
    pub restricted: bool,
}

impl<T> Setting<T> {
    pub fn new<I: Into<String>, N: Into<String>>(
        id: I,
        name: N,
        value: Option<T>,
        params: IndexMap<String, String>,
        restricted: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            value,
            params,
            restricted,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Replace the permitted value map, e.g. after new scores became available
    pub fn update_params(&mut self, params: IndexMap<String, String>) {
        self.params = params;
    }
}

impl<T: FromStr + Display> SettingLike for Setting<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn value_str(&self) -> Option<String> {
        self.value.as_ref().map(|v| v.to_string())
    }

    fn permitted_values(&self) -> &IndexMap<String, String> {
        &self.params
    }

    fn set_value_str(&mut self, value: &str) -> Result<(), SettingError> {
        if self.restricted && !self.params.contains_key(value) {
            return Err(SettingError::InvalidValue {
                setting: self.id.clone(),
                value: value.to_string(),
            });
        }
        match value.parse::<T>() {
            Ok(v) => {
                self.value = Some(v);
                Ok(())
            }
            Err(_) => Err(SettingError::InvalidValue {
                setting: self.id.clone(),
                value: value.to_string(),
            }),
        }
    }
}

impl<T: Display> Display for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}={}", self.id, v),
            None => write!(f, "{}=<unset>", self.id),
        }
    }
}

/// Look up a setting by id in a list of type-erased settings and set its value
pub fn set_by_id<'a>(
    settings: Vec<&'a mut dyn SettingLike>,
    id: &str,
    value: &str,
) -> Result<&'a dyn SettingLike, SettingError> {
    for setting in settings {
        if setting.id() == id {
            setting.set_value_str(value)?;
            return Ok(setting);
        }
    }
    Err(SettingError::UnknownSetting(id.to_string()))
}
