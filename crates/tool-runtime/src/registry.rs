use crate::schema::ArgumentSchema;
use crate::tool::{Tool, ToolCallResult, ToolContext, ToolDefinition, ToolError, ToolFamily};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Manages available tools, their schemas, and execution.
/// Thread-safe via Arc wrapping of individual tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    validators: HashMap<String, ArgumentSchema>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            validators: HashMap::new(),
        }
    }

    /// Register a tool, compiling its input schema. Fails on a duplicate name or an invalid schema.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let def = tool.definition();
        if self.tools.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        let validator = ArgumentSchema::compile(&def.input_schema)
            .map_err(|reason| RegistryError::InvalidSchema(def.name.clone(), reason))?;
        self.validators.insert(def.name.clone(), validator);
        self.tools.insert(def.name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered tool definitions, sorted by name (for sending to the LLM).
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn family(&self, name: &str) -> Option<ToolFamily> {
        self.tools.get(name).map(|t| t.definition().family)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and run a tool. Never fails: unknown names, invalid arguments,
    /// tool errors and panics all come back as [`ToolCallResult::Failure`].
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> ToolCallResult {
        let Some(tool) = self.get(name) else {
            warn!(tool = %name, "unknown tool requested");
            return ToolCallResult::failure("unknown tool", format!("Tool '{}' is not available", name));
        };

        let checked = match self.validators.get(name) {
            Some(validator) => validator.check(params),
            None => Err("no input schema registered".to_string()),
        };
        let params = match checked {
            Ok(params) => params,
            Err(reason) => {
                warn!(tool = %name, %reason, "rejected tool parameters");
                return ToolCallResult::failure(reason, format!("Invalid parameters for {}", name));
            }
        };

        debug!(tool = %name, %params, "executing tool");
        let outcome = AssertUnwindSafe(tool.execute(params, ctx)).catch_unwind().await;
        match outcome {
            Ok(Ok(result)) => {
                info!(tool = %name, success = result.is_success(), "tool finished");
                result
            }
            Ok(Err(ToolError::Data(e))) if e.is_presentable() => {
                info!(tool = %name, error = %e, "tool found nothing");
                ToolCallResult::failure(e.to_string(), e.to_string())
            }
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "tool failed");
                ToolCallResult::failure(e.to_string(), format!("Error executing {}", name))
            }
            Err(_) => {
                warn!(tool = %name, "tool panicked");
                ToolCallResult::failure("tool panicked", format!("Error executing {}", name))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
    #[error("Tool '{0}' has an invalid input schema: {1}")]
    InvalidSchema(String, String),
}
