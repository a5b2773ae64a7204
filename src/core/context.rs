//! Per-invocation command context.
//!
//! Every konfigure command runs against one `CommandContext`: the parsed
//! konfiguration for the targeted environment, one persistent shell session
//! with the toolkit sourced, and the common CLI flags.

use crate::error::{Error, Result};
use crate::helm::HelmClient;
use crate::konfig::{Environment, Konfiguration};
use crate::logging::LogContext;
use crate::session::{CommandResult, CommandRunner, RunOptions, ShellSession};
use crate::toolkit;
use crate::utils::shell;

/// Flags shared by every konfigure command.
#[derive(Debug, Clone, Default)]
pub struct KonfigureFlags {
    /// Print out commands rather than executing them.
    pub dryrun: bool,
    /// Skip expensive operations (repo updates) during development.
    pub testing: bool,
    /// Automatically authenticate with the environment's AWS account.
    pub auth: bool,
    /// Log out debug information.
    pub debug: bool,
    /// Running in a CI environment.
    pub cd: bool,
    /// Base directory to search for environments.
    pub base_dir: Option<String>,
}

pub struct CommandContext {
    pub konfig: Konfiguration,
    pub session: ShellSession,
    pub flags: KonfigureFlags,
    /// Trailing instance-selection args (`all`, `chart <charts…>`, names).
    pub filter: Vec<String>,
    pub helm: HelmClient,
    pub log: LogContext,
}

impl CommandContext {
    pub fn init(env_name: &str, filter: Vec<String>, flags: KonfigureFlags) -> Result<Self> {
        let konfig = Konfiguration::read(env_name, flags.base_dir.as_deref())?;
        konfig.log_header();

        let session = toolkit::init_toolkit_session(&flags)?;
        let log = LogContext::new("context", flags.debug);
        let helm = HelmClient::new(LogContext::new("helm", flags.debug));

        Ok(Self {
            konfig,
            session,
            flags,
            filter,
            helm,
            log,
        })
    }

    /// Authenticate against the environment's AWS account: optionally run
    /// the toolkit's login helper, then verify credentials. A failed check
    /// is fatal for the command.
    pub fn handle_auth(&mut self) -> Result<()> {
        let account = self.konfig.props.environment.aws_account.clone();
        run_auth(&mut self.session, &self.log, &self.flags, &account)
    }

    /// Make sure the environment's namespace exists, creating it when the
    /// lookup fails. Creation failures are logged, not fatal; the deploy
    /// itself will surface the real problem.
    pub fn ensure_namespace(&mut self) -> Result<()> {
        let environment = self.konfig.environment().clone();
        let env_name = self.konfig.name.clone();
        run_ensure_namespace(
            &mut self.session,
            &self.log,
            &self.flags,
            &environment,
            &env_name,
        )
    }

    pub fn close(&mut self) -> Result<CommandResult> {
        self.session.close()
    }
}

fn run_auth(
    runner: &mut dyn CommandRunner,
    log: &LogContext,
    flags: &KonfigureFlags,
    account: &str,
) -> Result<()> {
    log.blank();
    log.status("Checking authentication...");

    let profile = format!("{}-admin", account);
    if flags.auth {
        let auth_command = format!("awsAuth {}", profile);
        if flags.dryrun {
            log.status(&format!("dryrun: {}", auth_command));
        } else {
            // The login helper may prompt for an MFA token.
            runner.run_with(&auth_command, RunOptions { pipe_input: true })?;
            std::env::set_var("AWS_PROFILE", &profile);
        }
    }

    let check_command = format!("checkAccountAuthAndFail {}", account);
    if flags.dryrun {
        log.status(&format!("dryrun: {}", check_command));
        return Ok(());
    }

    let result = runner.run(&check_command)?;
    log.debug(&format!("check exit code: {}", result.exit_code));
    if result.exit_code != 0 {
        return Err(Error::auth_check_failed(account, result.exit_code));
    }
    Ok(())
}

fn run_ensure_namespace(
    runner: &mut dyn CommandRunner,
    log: &LogContext,
    flags: &KonfigureFlags,
    environment: &Environment,
    env_name: &str,
) -> Result<()> {
    let namespace = if environment.k8s_namespace.is_empty() {
        env_name
    } else {
        &environment.k8s_namespace
    };
    let context_arg = shell::quote_arg(&environment.k8s_context);
    let namespace_arg = shell::quote_arg(namespace);

    let get_command = format!(
        "kubectl --context {} get namespace {} >/dev/null 2>&1",
        context_arg, namespace_arg
    );
    let create_command = format!(
        "kubectl --context {} create namespace {}",
        context_arg, namespace_arg
    );

    if flags.dryrun {
        log.status(&format!("dryrun: {}", get_command));
        log.status(&format!("dryrun: {}", create_command));
        return Ok(());
    }

    log.debug("fetching namespace");
    if runner.run(&get_command)?.exit_code == 0 {
        return Ok(());
    }

    log.blank();
    log.status(&format!(
        "Initializing environment '{}' with namespace '{}'...",
        env_name, namespace
    ));
    log.status("Creating namespace...");

    let result = runner.run(&create_command)?;
    if result.exit_code != 0 {
        log.status("Namespace creation failed!");
    } else {
        log.status("Environment initialized!");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::logging::Level;
    use std::collections::VecDeque;

    struct RecordingRunner {
        commands: Vec<String>,
        exit_codes: VecDeque<i32>,
    }

    impl RecordingRunner {
        fn with_exit_codes(exit_codes: &[i32]) -> Self {
            Self {
                commands: Vec::new(),
                exit_codes: exit_codes.iter().copied().collect(),
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&mut self, command: &str) -> Result<CommandResult> {
            self.commands.push(command.to_string());
            Ok(CommandResult {
                exit_code: self.exit_codes.pop_front().unwrap_or(0),
                output: String::new(),
            })
        }
    }

    fn test_log() -> LogContext {
        LogContext::with_level("context", Level::Status)
    }

    fn test_environment() -> Environment {
        Environment {
            name: None,
            tf_env: "test-env-dev".to_string(),
            tf_module: "test-env-dev".to_string(),
            aws_account: "test-account".to_string(),
            aws_region: "eu-west-1".to_string(),
            k8s_context: "test-env-nonprod".to_string(),
            k8s_namespace: "test-env-dev".to_string(),
            eks_nodegroup: "workers".to_string(),
            chart_repo: None,
        }
    }

    #[test]
    fn auth_check_runs_without_auth_flag() {
        let mut runner = RecordingRunner::with_exit_codes(&[0]);
        run_auth(&mut runner, &test_log(), &KonfigureFlags::default(), "test-account").unwrap();

        assert_eq!(runner.commands, ["checkAccountAuthAndFail test-account"]);
    }

    #[test]
    fn auth_flag_logs_in_before_checking() {
        let mut runner = RecordingRunner::with_exit_codes(&[0, 0]);
        let flags = KonfigureFlags {
            auth: true,
            ..KonfigureFlags::default()
        };
        run_auth(&mut runner, &test_log(), &flags, "test-account").unwrap();

        assert_eq!(
            runner.commands,
            [
                "awsAuth test-account-admin",
                "checkAccountAuthAndFail test-account"
            ]
        );
    }

    #[test]
    fn dryrun_runs_no_auth_commands() {
        let mut runner = RecordingRunner::with_exit_codes(&[]);
        let flags = KonfigureFlags {
            auth: true,
            dryrun: true,
            ..KonfigureFlags::default()
        };
        run_auth(&mut runner, &test_log(), &flags, "test-account").unwrap();

        assert!(runner.commands.is_empty());
    }

    #[test]
    fn failed_auth_check_is_fatal() {
        let mut runner = RecordingRunner::with_exit_codes(&[1]);
        let err = run_auth(&mut runner, &test_log(), &KonfigureFlags::default(), "test-account")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthCheckFailed);
    }

    #[test]
    fn namespace_is_not_created_when_present() {
        let mut runner = RecordingRunner::with_exit_codes(&[0]);
        run_ensure_namespace(
            &mut runner,
            &test_log(),
            &KonfigureFlags::default(),
            &test_environment(),
            "test-env",
        )
        .unwrap();

        assert_eq!(runner.commands.len(), 1);
        assert!(runner.commands[0].contains("get namespace test-env-dev"));
    }

    #[test]
    fn namespace_is_created_when_lookup_fails() {
        let mut runner = RecordingRunner::with_exit_codes(&[1, 0]);
        run_ensure_namespace(
            &mut runner,
            &test_log(),
            &KonfigureFlags::default(),
            &test_environment(),
            "test-env",
        )
        .unwrap();

        assert_eq!(runner.commands.len(), 2);
        assert!(runner.commands[1]
            .contains("kubectl --context test-env-nonprod create namespace test-env-dev"));
    }

    #[test]
    fn namespace_creation_failure_is_not_fatal() {
        let mut runner = RecordingRunner::with_exit_codes(&[1, 1]);
        let result = run_ensure_namespace(
            &mut runner,
            &test_log(),
            &KonfigureFlags::default(),
            &test_environment(),
            "test-env",
        );
        assert!(result.is_ok());
    }

    #[test]
    fn namespace_falls_back_to_environment_name() {
        let mut environment = test_environment();
        environment.k8s_namespace = String::new();

        let mut runner = RecordingRunner::with_exit_codes(&[0]);
        run_ensure_namespace(
            &mut runner,
            &test_log(),
            &KonfigureFlags::default(),
            &environment,
            "test-env",
        )
        .unwrap();

        assert!(runner.commands[0].contains("get namespace test-env"));
    }
}
