use std::future::ready;
use std::pin::Pin;

use serde_json::{Map, Value};

use super::{Error, Tool, ToolOutput};

pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &Value;

    fn output_limit(&self) -> Option<usize>;

    fn execute(
        &self,
        arguments: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = ToolOutput> + Send>>;
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    #[inline]
    fn output_limit(&self) -> Option<usize> {
        self.0.output_limit()
    }

    fn execute(
        &self,
        arguments: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = ToolOutput> + Send>> {
        let input: T::Input =
            match serde_json::from_value(Value::Object(arguments)) {
                Ok(input) => input,
                Err(err) => {
                    debug!("rejected arguments: {err}");
                    let err = Error::invalid_input().with_reason(format!(
                        "Invalid arguments for tool `{}`: {err}",
                        self.name()
                    ));
                    return Box::pin(ready(err.into()));
                }
            };
        Box::pin(self.0.execute(input))
    }
}
