use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{
    definition::OperationDefinition,
    error::{Error, InputError, MissingParameterError},
};

/// Keyword mapping supplied by the caller
pub type Input = Map<String, Value>;

/// Resolved parameters, in declaration order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Subject and parameters bound to one operation instance
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    subject: Option<(String, Value)>,
    params: Params,
}

impl Arguments {
    pub fn subject_value(&self) -> Option<&Value> {
        self.subject.as_ref().map(|(_, value)| value)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Deserialize the subject
    pub fn subject<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let (name, value) = self.subject.as_ref().ok_or_else(|| InputError::MissingSubject {
            name: "subject".to_string(),
        })?;
        decode(name, value)
    }

    /// Deserialize the parameter `name`
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> Result<T, Error> {
        let value = self
            .params
            .get(name)
            .ok_or_else(|| InputError::InvalidParameter {
                name: name.to_string(),
                reason: "not declared".to_string(),
            })?;
        decode(name, value)
    }
}

fn decode<T: DeserializeOwned>(name: &str, value: &Value) -> Result<T, Error> {
    T::deserialize(value).map_err(|err| {
        InputError::InvalidParameter {
            name: name.to_string(),
            reason: err.to_string(),
        }
        .into()
    })
}

impl OperationDefinition {
    /// Bind `input` to this definition
    ///
    /// Walks the declarations in order: the subject must be present and non-null; each
    /// parameter takes the converted supplied value, else its default, else fails with
    /// [`MissingParameterError`]. Keys that are not declared are ignored.
    pub fn resolve(&self, mut input: Input) -> Result<Arguments, Error> {
        let mut resolved = Arguments::default();

        if let Some(name) = self.subject() {
            match input.remove(name) {
                Some(value) if !value.is_null() => {
                    resolved.subject = Some((name.to_string(), value));
                }
                _ => {
                    return Err(InputError::MissingSubject {
                        name: name.to_string(),
                    }
                    .into())
                }
            }
        }

        for spec in self.params() {
            let value = match input.remove(spec.name()) {
                Some(raw) => match spec.converter() {
                    Some(convert) => convert(raw).map_err(|reason| InputError::InvalidParameter {
                        name: spec.name().to_string(),
                        reason,
                    })?,
                    None => raw,
                },
                None => match spec.default() {
                    Some(default) => default.produce(&resolved),
                    None => {
                        return Err(MissingParameterError {
                            name: spec.name().to_string(),
                            supplied: supplied_keys(&input, &resolved),
                        }
                        .into())
                    }
                },
            };
            resolved
                .params
                .entries
                .push((spec.name().to_string(), value));
        }

        Ok(resolved)
    }
}

/// Keys the caller passed, including those already consumed
fn supplied_keys(remaining: &Input, resolved: &Arguments) -> Vec<String> {
    resolved
        .subject
        .iter()
        .map(|(name, _)| name.clone())
        .chain(resolved.params.entries.iter().map(|(name, _)| name.clone()))
        .chain(remaining.keys().cloned())
        .collect()
}
