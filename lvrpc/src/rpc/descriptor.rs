//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Method descriptions: name, typed parameters, return type and handler.

use crate::error::{Result, RpcError};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// JSON type a parameter or return value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// `true` or `false`.
    Bool,
    /// A number without a fractional part.
    Integral,
    /// Any number.
    Numeric,
    /// A string.
    String,
    /// An array.
    Array,
    /// An object.
    Object,
}

impl ParamType {
    /// Returns `true` if `value` has this type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use lvrpc::rpc::ParamType;
    /// use serde_json::json;
    ///
    /// assert!(ParamType::Integral.matches(&json!(20)));
    /// assert!(!ParamType::Integral.matches(&json!(2.5)));
    /// assert!(ParamType::Numeric.matches(&json!(2.5)));
    /// ```
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ParamType::Bool => value.is_boolean(),
            ParamType::Integral => value.is_i64() || value.is_u64(),
            ParamType::Numeric => value.is_number(),
            ParamType::String => value.is_string(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

/// Business logic of a method: receives the parameter object, returns the
/// result or a failure description.
pub type ServiceHandler = Arc<dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync>;

/// A callable method with its declared signature.
///
/// # Examples
///
/// ```rust
/// use lvrpc::rpc::{ParamType, ServiceDescriptor};
/// use serde_json::json;
///
/// let add = ServiceDescriptor::builder("add")
///     .param("num1", ParamType::Integral)
///     .param("num2", ParamType::Integral)
///     .returns(ParamType::Integral)
///     .handler(|params| {
///         let a = params["num1"].as_i64().unwrap_or_default();
///         let b = params["num2"].as_i64().unwrap_or_default();
///         Ok(json!(a + b))
///     })
///     .build()
///     .unwrap();
///
/// assert!(add.check_params(&json!({"num1": 20, "num2": 30})));
/// assert!(!add.check_params(&json!({"num1": 20})));
/// assert_eq!(add.call(&json!({"num1": 20, "num2": 30})), Ok(json!(50)));
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    method: String,
    params: Vec<(String, ParamType)>,
    return_type: ParamType,
    handler: ServiceHandler,
}

impl ServiceDescriptor {
    /// Starts describing `method`.
    pub fn builder(method: impl Into<String>) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder {
            method: method.into(),
            params: Vec::new(),
            return_type: None,
            handler: None,
        }
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the declared parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[(String, ParamType)] {
        &self.params
    }

    /// Returns the declared return type.
    #[must_use]
    pub const fn return_type(&self) -> ParamType {
        self.return_type
    }

    /// Returns `true` if `params` is an object holding every declared
    /// parameter with its declared type. Extra fields are allowed.
    #[must_use]
    pub fn check_params(&self, params: &Value) -> bool {
        let Some(fields) = params.as_object() else {
            return false;
        };
        self.params.iter().all(|(name, ty)| {
            fields.get(name).is_some_and(|value| ty.matches(value))
        })
    }

    /// Returns `true` if `result` has the declared return type.
    #[must_use]
    pub fn check_return(&self, result: &Value) -> bool {
        self.return_type.matches(result)
    }

    /// Invokes the handler.
    ///
    /// # Errors
    ///
    /// Whatever the handler reports.
    pub fn call(&self, params: &Value) -> std::result::Result<Value, String> {
        (self.handler)(params)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ServiceDescriptor`].
#[must_use]
pub struct ServiceDescriptorBuilder {
    method: String,
    params: Vec<(String, ParamType)>,
    return_type: Option<ParamType>,
    handler: Option<ServiceHandler>,
}

impl ServiceDescriptorBuilder {
    /// Declares a required parameter.
    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push((name.into(), ty));
        self
    }

    /// Declares the return type.
    pub fn returns(mut self, ty: ParamType) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// Sets the handler.
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Finishes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidService`] if the method name is empty, a
    /// parameter is declared twice, or the return type or handler is missing.
    pub fn build(self) -> Result<ServiceDescriptor> {
        let invalid = |reason: String| RpcError::InvalidService { reason };

        if self.method.is_empty() {
            return Err(invalid("method name is empty".to_string()));
        }
        let mut seen = BTreeSet::new();
        if let Some((name, _)) = self.params.iter().find(|(name, _)| !seen.insert(name.as_str())) {
            return Err(invalid(format!(
                "parameter {name} of {} declared twice",
                self.method
            )));
        }
        let return_type = self
            .return_type
            .ok_or_else(|| invalid(format!("{} has no return type", self.method)))?;
        let handler = self
            .handler
            .ok_or_else(|| invalid(format!("{} has no handler", self.method)))?;

        Ok(ServiceDescriptor {
            method: self.method,
            params: self.params,
            return_type,
            handler,
        })
    }
}

/// Method name to descriptor table.
#[derive(Default)]
pub struct ServiceManager {
    services: Mutex<HashMap<String, Arc<ServiceDescriptor>>>,
}

impl ServiceManager {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `service`. Returns `false`, keeping the existing entry, if its
    /// method is already present.
    pub fn insert_service(&self, service: ServiceDescriptor) -> bool {
        let mut services = self.services.lock();
        if services.contains_key(service.method()) {
            return false;
        }
        services.insert(service.method().to_string(), Arc::new(service));
        true
    }

    /// Removes `method`, returning its descriptor.
    pub fn remove_service(&self, method: &str) -> Option<Arc<ServiceDescriptor>> {
        self.services.lock().remove(method)
    }

    /// Looks up `method`.
    #[must_use]
    pub fn find_service(&self, method: &str) -> Option<Arc<ServiceDescriptor>> {
        self.services.lock().get(method).cloned()
    }

    /// Returns every method name, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<_> = self.services.lock().keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManager")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(method: &str) -> ServiceDescriptor {
        ServiceDescriptor::builder(method)
            .param("text", ParamType::String)
            .returns(ParamType::String)
            .handler(|params| Ok(params["text"].clone()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_param_type_matching() {
        assert!(ParamType::Bool.matches(&json!(true)));
        assert!(ParamType::Integral.matches(&json!(-3)));
        assert!(ParamType::Integral.matches(&json!(u64::MAX)));
        assert!(!ParamType::Integral.matches(&json!("3")));
        assert!(ParamType::Numeric.matches(&json!(3)));
        assert!(ParamType::Array.matches(&json!([])));
        assert!(ParamType::Object.matches(&json!({})));
        assert!(!ParamType::Object.matches(&Value::Null));
    }

    #[test]
    fn test_check_params() {
        let service = echo("echo");
        assert!(service.check_params(&json!({"text": "hi", "extra": 1})));
        assert!(!service.check_params(&json!({"text": 1})));
        assert!(!service.check_params(&json!({})));
        assert!(!service.check_params(&json!(["hi"])));
        assert!(service.check_return(&json!("hi")));
        assert!(!service.check_return(&json!(1)));
    }

    #[test]
    fn test_builder_rejects_incomplete_descriptions() {
        let missing_handler = ServiceDescriptor::builder("m").returns(ParamType::Bool).build();
        assert!(matches!(missing_handler, Err(RpcError::InvalidService { .. })));

        let missing_return = ServiceDescriptor::builder("m").handler(|_| Ok(Value::Null)).build();
        assert!(missing_return.is_err());

        let duplicate = ServiceDescriptor::builder("m")
            .param("a", ParamType::Bool)
            .param("a", ParamType::Bool)
            .returns(ParamType::Bool)
            .handler(|_| Ok(json!(true)))
            .build();
        assert!(duplicate.is_err());

        let unnamed = ServiceDescriptor::builder("")
            .returns(ParamType::Bool)
            .handler(|_| Ok(json!(true)))
            .build();
        assert!(unnamed.is_err());
    }

    #[test]
    fn test_service_manager() {
        let services = ServiceManager::new();
        assert!(services.insert_service(echo("b")));
        assert!(services.insert_service(echo("a")));
        assert!(!services.insert_service(echo("a")));
        assert_eq!(services.methods(), ["a", "b"]);

        assert!(services.find_service("a").is_some());
        assert!(services.remove_service("a").is_some());
        assert!(services.find_service("a").is_none());
    }
}
