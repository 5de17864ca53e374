pub mod doctor;
pub mod migrate;
pub mod seed;

use serde::Serialize;

/// Outcome of one subcommand: the process exit code plus one JSON line for
/// stdout. Scripts branch on `status` and `error_class`.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        Self::emit(
            0,
            CommandOutcome { command, status: "ok", error_class: None, message: message.into() },
        )
    }

    pub fn failure(
        command: &'static str,
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::emit(
            exit_code,
            CommandOutcome {
                command,
                status: "error",
                error_class: Some(error_class),
                message: message.into(),
            },
        )
    }

    fn emit(exit_code: u8, payload: CommandOutcome) -> Self {
        let output = serde_json::to_string(&payload).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                payload.command,
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        Self { exit_code, output }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::CommandResult;

    #[test]
    fn success_envelope_omits_the_error_class() {
        let result = CommandResult::success("migrate", "done");
        assert_eq!(result.exit_code, 0);

        let payload: Value = serde_json::from_str(&result.output).expect("json envelope");
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["message"], "done");
        assert!(payload.get("error_class").is_none());
    }

    #[test]
    fn failure_envelope_carries_class_and_exit_code() {
        let result = CommandResult::failure("seed", "db_connectivity", "no such file", 4);
        assert_eq!(result.exit_code, 4);

        let payload: Value = serde_json::from_str(&result.output).expect("json envelope");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "db_connectivity");
        assert_eq!(payload["message"], "no such file");
    }
}
