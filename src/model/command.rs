use serde::{Deserialize, Serialize};

/// Request to execute a single command on a speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub speaker: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(speaker: impl Into<String>, action: impl Into<String>, args: &[String]) -> Self {
        Self {
            speaker: speaker.into(),
            action: action.into(),
            args: args.to_vec(),
        }
    }
}

/// Result of one command, as reported by the command server.
///
/// Serializes camelCase for API clients; the snake_case aliases accept the
/// command server's own wire format (`exit_code`, `error_msg`) when parsing.
/// `exit_code` is deliberately not defaulted: a response without it is not a
/// command result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(alias = "exit_code")]
    pub exit_code: i32,
    #[serde(default)]
    pub result: String,
    #[serde(default, alias = "error_msg")]
    pub error_msg: String,
}

impl CommandResult {
    /// Exit code 0 means success, by convention of the command server.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Synthetic failure result for errors that never reached the command
    /// server (start failure, unreachable server, unknown speaker).
    pub fn synthetic_failure(request: &CommandRequest, message: impl Into<String>) -> Self {
        Self {
            speaker: request.speaker.clone(),
            action: request.action.clone(),
            args: request.args.clone(),
            exit_code: -1,
            result: String::new(),
            error_msg: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_wire_format() {
        let body = r#"{
            "speaker": "Kitchen",
            "action": "volume",
            "args": [],
            "exit_code": 0,
            "result": "25",
            "error_msg": ""
        }"#;
        let parsed: CommandResult = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.speaker, "Kitchen");
        assert_eq!(parsed.exit_code, 0);
        assert_eq!(parsed.result, "25");
        assert!(parsed.is_success());
    }

    #[test]
    fn missing_exit_code_is_rejected() {
        let parsed: Result<CommandResult, _> =
            serde_json::from_str(r#"{ "speaker": "Kitchen" }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn serializes_camel_case_for_clients() {
        let request = CommandRequest::new("Office", "mute", &[]);
        let result = CommandResult::synthetic_failure(&request, "server not running");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exitCode"], -1);
        assert_eq!(json["errorMsg"], "server not running");
        assert!(!result.is_success());
    }
}
