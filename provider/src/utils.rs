use agentkit_extraction::message::{Message, Role};
use rig::completion::Message as RigMessage;
use rig::completion::message::AssistantContent;
use rig::OneOrMany;

/// A conversation reshaped for a rig completion request.
#[derive(Debug, Clone)]
pub struct RigConversation {
    /// System turns joined by blank lines, sent as the preamble.
    pub preamble: Option<String>,
    /// Turns before the prompt, oldest first.
    pub history: Vec<RigMessage>,
    /// The final non-system turn.
    pub prompt: RigMessage,
}

/// Splits a conversation into preamble, chat history and prompt.
///
/// Returns `None` when the conversation holds no user or assistant turn.
#[must_use]
pub fn to_rig_conversation(conversation: &[Message]) -> Option<RigConversation> {
    let system: Vec<&str> = conversation
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let preamble = (!system.is_empty()).then(|| system.join("\n\n"));

    let mut turns: Vec<RigMessage> = conversation
        .iter()
        .filter_map(|m| match m.role {
            Role::System => None,
            Role::User => Some(RigMessage::user(m.content.clone())),
            Role::Assistant => Some(RigMessage::assistant(m.content.clone())),
        })
        .collect();
    let prompt = turns.pop()?;

    Some(RigConversation {
        preamble,
        history: turns,
        prompt,
    })
}

/// Concatenates the text parts of an assistant choice.
#[must_use]
pub fn choice_text(choice: &OneOrMany<AssistantContent>) -> String {
    choice
        .iter()
        .filter_map(|content| match content {
            AssistantContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_turns_become_preamble() {
        let conversation = [
            Message::system("be terse"),
            Message::system("answer in JSON"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("again"),
        ];
        let rig = to_rig_conversation(&conversation).unwrap();
        assert_eq!(rig.preamble.as_deref(), Some("be terse\n\nanswer in JSON"));
        assert_eq!(rig.history.len(), 2);
        assert_eq!(rig.prompt, RigMessage::user("again"));
    }

    #[test]
    fn test_system_only_conversation_has_no_prompt() {
        assert!(to_rig_conversation(&[Message::system("x")]).is_none());
        assert!(to_rig_conversation(&[]).is_none());
    }

    #[test]
    fn test_choice_text_joins_text_parts() {
        let choice = OneOrMany::many(vec![
            AssistantContent::text("```json"),
            AssistantContent::text("{}```"),
        ])
        .unwrap();
        assert_eq!(choice_text(&choice), "```json{}```");
    }
}
