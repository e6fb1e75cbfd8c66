//! JSON payloads exchanged with the debug target.

use serde::{Deserialize, Serialize};

use scriptdbg_analysis::PluginId;

use crate::error::SessionError;

/// Breakpoint as seen by the debug target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointDetails {
    pub language_id: PluginId,
    /// Path relative to the project asset root, `/`-separated.
    pub relative_path: String,
    pub line: u32,
    /// Empty when the condition is disabled or blank.
    pub condition: String,
    pub expected_result: bool,
    pub use_function_env: bool,
}

/// Liveness ping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub plugin_id: PluginId,
}

/// Asks the target to reload a script that changed on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAndContinue {
    pub language_id: PluginId,
    pub relative_path: String,
}

/// Output text forwarded by the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBody {
    pub text: String,
}

/// Location the target stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointHitBody {
    pub language_id: PluginId,
    pub relative_path: String,
    pub line: u32,
}

/// Messages sent to the debug target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum OutboundMessage {
    AddBreakpoint(BreakpointDetails),
    RemoveBreakpoint(BreakpointDetails),
    Heartbeat(Heartbeat),
    EditAndContinue(EditAndContinue),
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string(self).map_err(|err| SessionError::Protocol(err.to_string().into()))
    }
}

/// Messages received from the debug target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum InboundMessage {
    Heartbeat(Heartbeat),
    Output(OutputBody),
    BreakpointHit(BreakpointHitBody),
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    pub fn from_json(text: &str) -> Result<Self, SessionError> {
        serde_json::from_str(text).map_err(|err| SessionError::Protocol(err.to_string().into()))
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    #[test]
    fn breakpoint_payload_uses_camel_case() {
        let message = OutboundMessage::AddBreakpoint(BreakpointDetails {
            language_id: PluginId::new("lua"),
            relative_path: "scripts/ai/brain.lua".to_string(),
            line: 42,
            condition: "hp < 10".to_string(),
            expected_result: true,
            use_function_env: false,
        });
        expect![[r#"{"type":"addBreakpoint","body":{"languageId":"lua","relativePath":"scripts/ai/brain.lua","line":42,"condition":"hp < 10","expectedResult":true,"useFunctionEnv":false}}"#]]
            .assert_eq(&message.to_json().unwrap());
    }

    #[test]
    fn heartbeat_payload_shape() {
        let message = OutboundMessage::Heartbeat(Heartbeat {
            plugin_id: PluginId::new("python"),
        });
        expect![[r#"{"type":"heartbeat","body":{"pluginId":"python"}}"#]]
            .assert_eq(&message.to_json().unwrap());
    }

    #[test]
    fn unknown_inbound_messages_still_parse() {
        let message = InboundMessage::from_json(r#"{"type":"threadList","body":{"threads":[]}}"#)
            .unwrap();
        assert_eq!(message, InboundMessage::Unknown);

        let output = InboundMessage::from_json(r#"{"type":"output","body":{"text":"hello"}}"#)
            .unwrap();
        assert_eq!(
            output,
            InboundMessage::Output(OutputBody {
                text: "hello".to_string()
            })
        );
    }

    #[test]
    fn malformed_inbound_message_is_a_protocol_error() {
        assert!(matches!(
            InboundMessage::from_json("{not json"),
            Err(SessionError::Protocol(_))
        ));
    }
}
