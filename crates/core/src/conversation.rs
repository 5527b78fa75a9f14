//! Conversation-related types.

use std::fmt::{self, Display};
use std::slice;

use relay_agent_model::{ModelMessage, ToolCallResult};

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The system instructions.
    System,
    /// The human on the other side.
    User,
    /// The model.
    Assistant,
    /// A tool result fed back to the model.
    Tool,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A message in the conversation.
///
/// Messages are immutable. A message has a tool name if and only if its
/// role is [`Role::Tool`], which the constructors guarantee.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Message {
    role: Role,
    content: String,
    tool_name: Option<String>,
}

impl Message {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::untagged(Role::System, content.into())
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::untagged(Role::User, content.into())
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::untagged(Role::Assistant, content.into())
    }

    /// Creates a tool result message produced by the tool `name`.
    #[inline]
    pub fn tool<N: Into<String>, S: Into<String>>(name: N, content: S) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name: Some(name.into()),
        }
    }

    #[inline]
    fn untagged(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            tool_name: None,
        }
    }

    /// Returns the role of this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text content of this message.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the name of the tool that produced this message, if it's a
    /// tool result.
    #[inline]
    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub(crate) fn to_model_message(&self) -> ModelMessage {
        let content = self.content.clone();
        match self.role {
            Role::System => ModelMessage::System(content),
            Role::User => ModelMessage::User(content),
            Role::Assistant => ModelMessage::Assistant(content),
            Role::Tool => ModelMessage::Tool(ToolCallResult {
                name: self.tool_name.clone().unwrap_or_default(),
                content,
            }),
        }
    }
}

/// Represents a conversation.
///
/// Messages are kept in insertion order, and the whole sequence is sent to
/// the model on every call. Only the agent appends to a conversation, so
/// callers get read-only access here.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    items: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all messages, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.items
    }

    /// Returns the most recent message.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.items.last()
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns an iterator over the messages.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.items.iter()
    }

    /// Returns the leading system prompt, if one has been inserted.
    pub fn system_prompt(&self) -> Option<&str> {
        self.items
            .first()
            .filter(|msg| msg.role == Role::System)
            .map(Message::content)
    }

    pub(crate) fn push(&mut self, msg: Message) {
        debug_assert!(
            msg.role != Role::System,
            "system prompt must be inserted with `ensure_system_prompt`"
        );
        self.items.push(msg);
    }

    /// Inserts the system prompt at the front unless the conversation
    /// already starts with one. Returns `true` if it was inserted.
    pub(crate) fn ensure_system_prompt(&mut self, prompt: &str) -> bool {
        if self.system_prompt().is_some() {
            return false;
        }
        self.items.insert(0, Message::system(prompt));
        true
    }

    pub(crate) fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.items.iter().map(Message::to_model_message).collect()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_name_only_on_tool_messages() {
        assert_eq!(Message::user("hi").tool_name(), None);
        assert_eq!(Message::assistant("hi").tool_name(), None);
        assert_eq!(Message::system("hi").tool_name(), None);

        let msg = Message::tool("search", "- result");
        assert_eq!(msg.role(), Role::Tool);
        assert_eq!(msg.tool_name(), Some("search"));
        assert_eq!(msg.content(), "- result");
    }

    #[test]
    fn test_system_prompt_inserted_once() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("Hello"));

        assert!(conversation.ensure_system_prompt("Be brief."));
        assert!(!conversation.ensure_system_prompt("Be brief."));
        assert!(!conversation.ensure_system_prompt("Something else."));

        conversation.push(Message::assistant("Hi"));
        assert!(!conversation.ensure_system_prompt("Be brief."));

        let roles: Vec<_> = conversation.iter().map(Message::role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::Assistant]);
        assert_eq!(conversation.system_prompt(), Some("Be brief."));
    }

    #[test]
    fn test_to_model_messages() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("What's 1+1?"));
        conversation.push(Message::tool("run_js", "2"));
        conversation.ensure_system_prompt("Use tools.");

        assert_eq!(
            conversation.to_model_messages(),
            [
                ModelMessage::System("Use tools.".to_owned()),
                ModelMessage::User("What's 1+1?".to_owned()),
                ModelMessage::Tool(ToolCallResult {
                    name: "run_js".to_owned(),
                    content: "2".to_owned(),
                }),
            ]
        );
    }
}
