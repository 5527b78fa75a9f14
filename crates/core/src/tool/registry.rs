use std::collections::HashMap;

use relay_agent_model::ToolSpec;
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::tool::object::{ToolObject, ToolObjectImpl};
use crate::tool::{Tool, ToolOutput};

/// The outcome of dispatching a tool call request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// The tool ran and produced an output.
    Completed {
        /// What the tool returned.
        output: ToolOutput,
        /// The output limit declared by the tool.
        output_limit: Option<usize>,
    },
    /// No tool with the requested name is registered.
    UnknownTool,
}

/// An object that owns the toolset and handles requests from the model.
///
/// Tools keep the order they were added in, so the specs sent to the model
/// are identical on every call.
#[derive(Default)]
pub struct Registry {
    tools: Vec<Box<dyn ToolObject>>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// A tool with the same name as an existing one replaces it, keeping
    /// the original position.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let name = tool.name().to_owned();
        let tool = Box::new(ToolObjectImpl(tool));
        match self.index.get(&name) {
            Some(&idx) => {
                debug!("replacing tool: {name}");
                self.tools[idx] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns `true` if a tool named `name` is registered.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns the specs of all tools in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs the tool named `name` with the given arguments.
    ///
    /// An unknown name is not an error here, it's reported as
    /// [`Dispatch::UnknownTool`] for the caller to handle.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Dispatch {
        let Some(tool) = self.index.get(name).map(|&idx| &self.tools[idx])
        else {
            warn!("tool not found: {name}");
            return Dispatch::UnknownTool;
        };

        let span = debug_span!("tool registry", tool = name);
        span.in_scope(|| trace!("executing with args: {arguments:?}"));
        let output = tool.execute(arguments).instrument(span).await;
        Dispatch::Completed {
            output,
            output_limit: tool.output_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::sync::LazyLock;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    static ECHO_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    });

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool(&'static str);

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echoes the text"
        }

        fn parameter_schema(&self) -> &Value {
            &ECHO_SCHEMA
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolOutput> + Send + 'static {
            ready(ToolOutput::text(format!("{}: {}", self.0, input.text)))
        }
    }

    fn args(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("not an object");
        };
        map
    }

    #[test]
    fn test_specs_keep_registration_order() {
        let mut registry = Registry::new();
        for name in ["search", "aipipe", "run_js", "alpha"] {
            registry.add_tool(EchoTool(name));
        }
        registry.add_tool(EchoTool("aipipe"));

        let names: Vec<_> =
            registry.specs().into_iter().map(|spec| spec.name).collect();
        assert_eq!(names, ["search", "aipipe", "run_js", "alpha"]);
        assert_eq!(registry.specs(), registry.specs());
        assert_eq!(registry.len(), 4);
        assert!(registry.contains("run_js"));
        assert!(!registry.contains("frobnicate"));
    }

    #[tokio::test]
    async fn test_dispatch() {
        let mut registry = Registry::new();
        registry.add_tool(EchoTool("echo"));

        let dispatch =
            registry.dispatch("echo", args(json!({ "text": "hi" }))).await;
        assert_eq!(
            dispatch,
            Dispatch::Completed {
                output: ToolOutput::text("echo: hi"),
                output_limit: None,
            }
        );

        let dispatch =
            registry.dispatch("frobnicate", args(json!({}))).await;
        assert_eq!(dispatch, Dispatch::UnknownTool);
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_output() {
        let mut registry = Registry::new();
        registry.add_tool(EchoTool("echo"));

        let Dispatch::Completed { output, .. } =
            registry.dispatch("echo", args(json!({ "text": 42 }))).await
        else {
            panic!("expected the tool to be found");
        };
        let ToolOutput::Text(text) = output else {
            panic!("expected a text output");
        };
        assert!(text.starts_with("Invalid arguments for tool `echo`: "));
    }
}
