use std::{fmt, sync::Arc};

use serde_json::Value;

use super::arguments::Arguments;

/// Producer for a lazy default
///
/// Receives the arguments resolved so far: the subject and every parameter declared before
/// this one.
pub type Producer = Arc<dyn Fn(&Arguments) -> Value + Send + Sync>;

/// Turns an explicitly supplied raw value into the stored value
pub type Converter = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Lazy(Producer),
}

impl DefaultValue {
    pub(super) fn produce(&self, resolved: &Arguments) -> Value {
        match self {
            DefaultValue::Literal(value) => value.clone(),
            DefaultValue::Lazy(producer) => producer(resolved),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Declarative description of one keyword input
#[derive(Clone)]
pub struct ParamSpec {
    name: String,
    default: Option<DefaultValue>,
    converter: Option<Converter>,
}

impl ParamSpec {
    /// A required parameter, passed through as is
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            converter: None,
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Default computed only when the caller did not supply the parameter
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn(&Arguments) -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Lazy(Arc::new(producer)));
        self
    }

    /// Converter for supplied values
    ///
    /// Never applied to the default, which allows "optional, but parsed when present".
    pub fn convert_with<F>(mut self, converter: F) -> Self
    where
        F: Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.converter = Some(Arc::new(converter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn converter(&self) -> Option<&Converter> {
        self.converter.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("converter", &self.converter.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Static metadata of one operation type
///
/// Built once per type and never mutated afterwards. Derived types start from a copy of their
/// parent's definition, so parent and child never share declarations.
#[derive(Clone, Debug)]
pub struct OperationDefinition {
    name: String,
    subject: Option<String>,
    params: Vec<ParamSpec>,
    transactional: bool,
}

impl OperationDefinition {
    pub fn builder(name: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder {
            definition: OperationDefinition {
                name: name.into(),
                subject: None,
                params: Vec::new(),
                transactional: false,
            },
        }
    }

    /// Start a child definition inheriting subject, parameters and transactional flag
    pub fn derive(&self, name: impl Into<String>) -> DefinitionBuilder {
        let mut definition = self.clone();
        definition.name = name.into();
        DefinitionBuilder { definition }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Parameters in declaration order
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|spec| spec.name == name)
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }
}

#[derive(Debug)]
pub struct DefinitionBuilder {
    definition: OperationDefinition,
}

impl DefinitionBuilder {
    pub fn subject(mut self, name: impl Into<String>) -> Self {
        self.definition.subject = Some(name.into());
        self
    }

    /// Declare a parameter
    ///
    /// Redeclaring an existing name replaces that entry where it stands, keeping the order.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        let params = &mut self.definition.params;
        match params.iter_mut().find(|existing| existing.name == spec.name) {
            Some(existing) => *existing = spec,
            None => params.push(spec),
        }
        self
    }

    pub fn transactional(mut self, flag: bool) -> Self {
        self.definition.transactional = flag;
        self
    }

    pub fn build(self) -> OperationDefinition {
        self.definition
    }
}
