//! Chitin shell toolkit integration.
//!
//! The deployment helpers konfigure drives (`awsAuth`,
//! `checkAccountAuthAndFail`, `k8sDebugPod`, `awsEksServiceGetExternalDns`)
//! are shell functions provided by the chitin toolkit. Sessions source its
//! init script on startup so those functions are available; one-shot
//! toolkit commands source it inline.

use std::path::PathBuf;

use serde::Deserialize;

use crate::context::KonfigureFlags;
use crate::error::{Error, Result};
use crate::files;
use crate::logging::LogContext;
use crate::paths;
use crate::session::{run_one_shot, SessionOptions, ShellSession};
use crate::utils::shell;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChitinConfig {
    #[serde(default)]
    project_dir: Option<String>,
}

/// Locate the toolkit init script through the chitin config file.
pub fn find_init_script() -> Result<PathBuf> {
    let config_path = paths::chitin_config()?;
    let config: ChitinConfig = files::read_config_file(&config_path)?;

    let project_dir = config
        .project_dir
        .filter(|dir| !dir.is_empty())
        .ok_or_else(|| {
            Error::konfig_invalid_value(
                "projectDir",
                format!("No projectDir configured in {}", config_path.display()),
            )
        })?;
    let project_dir = shellexpand::tilde(&project_dir).into_owned();

    Ok(PathBuf::from(project_dir)
        .join("chitin")
        .join("shell")
        .join("init.sh"))
}

/// Start a session with the toolkit sourced. A missing or failing init
/// script leaves a plain session behind rather than failing the command.
pub fn init_toolkit_session(flags: &KonfigureFlags) -> Result<ShellSession> {
    let log = LogContext::new("shell", flags.debug);
    let mut session = ShellSession::spawn(SessionOptions::default(), log.clone())?;

    log.debug("initializing toolkit...");
    match find_init_script() {
        Ok(script) => {
            let source_command = format!("source {}", shell::quote_path(&script.display().to_string()));
            let result = session.run_command(&source_command)?;
            if result.exit_code != 0 {
                log.debug(&format!(
                    "toolkit init exited with status {}",
                    result.exit_code
                ));
            }
        }
        Err(e) => log.debug(&format!("toolkit init skipped: {}", e.message)),
    }

    Ok(session)
}

/// Run a toolkit command in a disposable terminal-attached shell.
pub fn run_toolkit_command(command: &str) -> Result<i32> {
    let script = find_init_script()?;
    run_one_shot(&format!(
        "source {}; {};",
        shell::quote_path(&script.display().to_string()),
        command
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // One test so the XDG_CONFIG_HOME mutation cannot race a parallel test.
    #[test]
    fn init_script_resolution_follows_chitin_config() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", dir.path());

        // No config file at all.
        assert!(find_init_script().is_err());

        // Config without a projectDir.
        let chitin_dir = dir.path().join("chitin");
        fs::create_dir_all(&chitin_dir).unwrap();
        fs::write(chitin_dir.join("config.json"), "{}").unwrap();
        assert!(find_init_script().is_err());

        // Fully configured.
        fs::write(
            chitin_dir.join("config.json"),
            r#"{"projectDir": "/opt/workspace"}"#,
        )
        .unwrap();
        let script = find_init_script().unwrap();
        assert_eq!(
            script,
            PathBuf::from("/opt/workspace/chitin/shell/init.sh")
        );

        std::env::remove_var("XDG_CONFIG_HOME");
    }
}
