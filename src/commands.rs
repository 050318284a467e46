//! Pipeline entry points, one `App::cmd_*` method per subcommand.
//!
//! Each command writes human-readable progress to `stdout` and returns a
//! serializable result whose camelCase fields are the invocation's outputs.

pub mod checkout;
pub mod publish;
pub mod pull_request;
pub mod push;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

/// Write a command result as `key: value` lines, or as one JSON object.
///
/// Lines are sorted by key. Absent (`null`) outputs are omitted.
pub fn write_outputs(
    result: &impl Serialize,
    json: bool,
    stdout: &mut impl std::io::Write,
) -> anyhow::Result<()> {
    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(result)?)?;
        return Ok(());
    }

    let value = serde_json::to_value(result)?;
    let Value::Object(fields) = value else {
        anyhow::bail!("command result is not a JSON object");
    };
    let mut fields: Vec<_> = fields.into_iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (key, value) in fields {
        match value {
            Value::Null => {}
            Value::String(s) => writeln!(stdout, "{}: {}", key.bold(), s)?,
            other => writeln!(stdout, "{}: {}", key.bold(), other)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::push::PushResult;

    #[test]
    fn test_write_outputs_lines() {
        let result = PushResult {
            remote_url: "https://host/scm/team/svc.git".to_string(),
            commit_hash: None,
        };
        let mut out = Vec::new();
        write_outputs(&result, false, &mut out).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @"remoteUrl: https://host/scm/team/svc.git");
    }

    #[test]
    fn test_write_outputs_json() {
        let result = PushResult {
            remote_url: "https://host/scm/team/svc.git".to_string(),
            commit_hash: Some("abc123".to_string()),
        };
        let mut out = Vec::new();
        write_outputs(&result, true, &mut out).unwrap();
        insta::assert_snapshot!(String::from_utf8(out).unwrap(), @r#"
        {
          "remoteUrl": "https://host/scm/team/svc.git",
          "commitHash": "abc123"
        }
        "#);
    }
}
