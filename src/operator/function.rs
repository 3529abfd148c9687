//! # User Functions
//!
//! Functions are registered once and shared by every operator that calls
//! them. A [`FunctionCall`] binds a registered function to its parameters.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::data::{Header, Row, Value};

use super::errors::{OperatorError, OperatorResult};

/// Cardinality of a function's mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappingType {
    /// One row in, at most one row out
    RowMapping,
    /// Whole set in, one row out (aggregates)
    SetMapping,
    /// Whole set in, many rows out
    Mapping,
}

impl MappingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingType::RowMapping => "row_mapping",
            MappingType::SetMapping => "set_mapping",
            MappingType::Mapping => "mapping",
        }
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user function
pub trait Function: Send + Sync {
    fn name(&self) -> &str;

    fn mapping_type(&self) -> MappingType;

    /// Maps one row. Returning `Ok(None)` drops the row.
    ///
    /// Only called for [`MappingType::RowMapping`] functions. The row stays
    /// aligned with `header`.
    fn transform(
        &self,
        row: Row,
        header: &Header,
        params: &BTreeMap<String, Value>,
    ) -> OperatorResult<Option<Row>>;
}

/// A function bound to its call parameters
#[derive(Clone)]
pub struct FunctionCall {
    function: Arc<dyn Function>,
    params: BTreeMap<String, Value>,
}

impl FunctionCall {
    pub fn new(function: Arc<dyn Function>, params: BTreeMap<String, Value>) -> Self {
        Self { function, params }
    }

    /// Binds the function registered under `name`
    pub fn from_registry(
        registry: &FunctionRegistry,
        name: &str,
        params: BTreeMap<String, Value>,
    ) -> OperatorResult<Self> {
        Ok(Self::new(registry.get(name)?, params))
    }

    pub fn function(&self) -> &Arc<dyn Function> {
        &self.function
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }

    pub fn apply(&self, row: Row, header: &Header) -> OperatorResult<Option<Row>> {
        self.function.transform(row, header, &self.params)
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("function", &self.function.name())
            .field("mapping_type", &self.function.mapping_type())
            .field("params", &self.params)
            .finish()
    }
}

/// Registry of functions by name
#[derive(Default)]
pub struct FunctionRegistry {
    by_name: RwLock<HashMap<String, Arc<dyn Function>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function; names are unique
    pub fn register(&self, function: Arc<dyn Function>) -> OperatorResult<()> {
        let mut by_name = self
            .by_name
            .write()
            .map_err(|_| OperatorError::Internal("Lock poisoned".into()))?;

        let name = function.name().to_string();
        if by_name.contains_key(&name) {
            return Err(OperatorError::FunctionExists(name));
        }
        by_name.insert(name, function);
        Ok(())
    }

    pub fn get(&self, name: &str) -> OperatorResult<Arc<dyn Function>> {
        let by_name = self
            .by_name
            .read()
            .map_err(|_| OperatorError::Internal("Lock poisoned".into()))?;
        by_name
            .get(name)
            .cloned()
            .ok_or_else(|| OperatorError::UnknownFunction(name.to_string()))
    }

    pub fn unregister(&self, name: &str) -> OperatorResult<()> {
        let mut by_name = self
            .by_name
            .write()
            .map_err(|_| OperatorError::Internal("Lock poisoned".into()))?;
        by_name
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| OperatorError::UnknownFunction(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .by_name
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Row function that multiplies every numeric value by `factor`
    pub(crate) struct Scale;

    impl Function for Scale {
        fn name(&self) -> &str {
            "scale"
        }

        fn mapping_type(&self) -> MappingType {
            MappingType::RowMapping
        }

        fn transform(
            &self,
            mut row: Row,
            _header: &Header,
            params: &BTreeMap<String, Value>,
        ) -> OperatorResult<Option<Row>> {
            let factor = params
                .get("factor")
                .and_then(Value::as_f64)
                .unwrap_or(1.0);
            for value in row.values.iter_mut().flatten() {
                if let Some(v) = value.as_f64() {
                    *value = Value::Double(v * factor);
                }
            }
            Ok(Some(row))
        }
    }

    /// Aggregate; never valid inside a row transform
    pub(crate) struct Avg;

    impl Function for Avg {
        fn name(&self) -> &str {
            "avg"
        }

        fn mapping_type(&self) -> MappingType {
            MappingType::SetMapping
        }

        fn transform(
            &self,
            _row: Row,
            _header: &Header,
            _params: &BTreeMap<String, Value>,
        ) -> OperatorResult<Option<Row>> {
            Err(OperatorError::FunctionFailed {
                name: "avg".into(),
                message: "not a row function".into(),
            })
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(Scale)).unwrap();
        registry.register(Arc::new(Avg)).unwrap();

        assert_eq!(registry.names(), vec!["avg", "scale"]);
        assert_eq!(
            registry.get("scale").unwrap().mapping_type(),
            MappingType::RowMapping
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(Scale)).unwrap();
        let err = registry.register(Arc::new(Scale)).unwrap_err();
        assert_eq!(err.code(), "POLY_OPERATOR_FUNCTION_EXISTS");
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = FunctionCall::from_registry(&registry, "missing", BTreeMap::new()).unwrap_err();
        assert_eq!(err, OperatorError::UnknownFunction("missing".into()));

        registry.register(Arc::new(Scale)).unwrap();
        registry.unregister("scale").unwrap();
        assert!(registry.get("scale").is_err());
    }

    #[test]
    fn test_call_applies_params() {
        let mut params = BTreeMap::new();
        params.insert("factor".to_string(), Value::Double(2.0));
        let call = FunctionCall::new(Arc::new(Scale), params);

        let row = Row::new(1, vec![Some(Value::Double(1.5)), None]);
        let out = call.apply(row, &Header::default()).unwrap().unwrap();
        assert_eq!(out.values, vec![Some(Value::Double(3.0)), None]);
    }
}
