use async_trait::async_trait;
use devconf_core::Result;
use devconf_model::ToolDefinition;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A function the model can call during the tool loop.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(self.name(), self.description(), self.parameters_schema())
    }
}

type AsyncHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

pub struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
    handler: AsyncHandler,
}

impl FunctionTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Box::new(move |args| Box::pin(handler(args))),
        }
    }

    pub fn into_arc(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        (self.handler)(args).await
    }
}

/// Typed accessors over a tool's JSON arguments.
pub(crate) mod args {
    use devconf_core::{DevconfError, Result};
    use serde_json::Value;

    pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
        args.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DevconfError::Validation(format!("missing required argument `{}`", key)))
    }

    pub fn str_or<'a>(args: &'a Value, key: &str, default: &'a str) -> &'a str {
        args.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).unwrap_or(default)
    }

    /// Integer argument clamped to `1..=max`. Models sometimes send numbers as strings.
    pub fn count(args: &Value, key: &str, default: u64, max: u64) -> u64 {
        let value = match args.get(key) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        value.unwrap_or(default).clamp(1, max)
    }
}
