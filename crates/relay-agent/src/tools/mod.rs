//! A set of built-in tools that models can use.
//!
//! Every tool talks to one external HTTP service. Failures never leave the
//! tool, they are turned into output the model can read.

mod sandbox;
mod search;
mod text_gen;

use relay_agent_core::tool::truncate_chars;
use schemars::Schema;
use serde_json::{Value, json};

pub use sandbox::{DEFAULT_SANDBOX_URL, RunJsTool};
pub use search::{
    DEFAULT_MAX_RESULTS, DEFAULT_RESULTS, NOT_CONFIGURED, SearchConfig,
    SearchTool,
};
pub use text_gen::{AIPipeConfig, AIPipeTool, DEFAULT_AIPIPE_URL};

/// How much of an unrecognized response body is shown to the model.
const RAW_BODY_LIMIT: usize = 1500;

/// Lists `fields` as required in a parameter schema. Fields with a serde
/// default are left optional by the derive otherwise.
fn require(fields: &'static [&'static str]) -> impl FnMut(&mut Schema) {
    move |schema: &mut Schema| {
        schema.insert("required".to_owned(), json!(fields));
    }
}

fn compact_json(value: &Value, limit: usize) -> String {
    let json = value.to_string();
    truncate_chars(&json, limit).to_owned()
}
