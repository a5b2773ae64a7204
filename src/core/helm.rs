//! Helm command assembly and execution through the shell session.

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::context::KonfigureFlags;
use crate::error::{Error, Result};
use crate::konfig::{ChartSource, Instance, Konfiguration, ValuesMap};
use crate::logging::LogContext;
use crate::session::CommandRunner;
use crate::utils::shell;

pub struct HelmClient {
    log: LogContext,
}

impl HelmClient {
    pub fn new(log: LogContext) -> Self {
        Self { log }
    }

    /// Run `helm <args>` through the session. Empty args are dropped and the
    /// command's stderr is folded into stdout (`2>&1`) so everything helm
    /// prints travels on the data channel instead of polluting the control
    /// channel. A nonzero exit is fatal.
    pub fn run_helm_command(
        &self,
        runner: &mut dyn CommandRunner,
        flags: &KonfigureFlags,
        helm_args: &[String],
    ) -> Result<()> {
        let mut args: Vec<String> = helm_args
            .iter()
            .filter(|arg| !arg.is_empty())
            .cloned()
            .collect();
        if flags.debug {
            args.push("--debug".to_string());
        }
        let full_command = format!("helm {}", args.join(" "));

        self.log.blank();
        self.log.debug("Running helm command...");
        if flags.dryrun {
            self.log.status(&format!("dryrun: {}", full_command));
            return Ok(());
        }

        let result = runner.run(&format!("{} 2>&1", full_command))?;
        if result.exit_code != 0 {
            self.log.status(&format!(
                "Helm command failed with error code {}!",
                result.exit_code
            ));
            return Err(Error::helm_command_failed(&full_command, result.exit_code));
        }
        Ok(())
    }

    pub fn update_repos(&self, runner: &mut dyn CommandRunner, flags: &KonfigureFlags) -> Result<()> {
        self.log.blank();
        self.log.status("Updating repositories...");
        self.run_helm_command(runner, flags, &["repo".to_string(), "update".to_string()])
    }
}

/// One instance's chart, bound to its environment, for running chart-scoped
/// helm operations.
pub struct HelmChart<'a> {
    instance: &'a Instance,
    konfig: &'a Konfiguration,
    env_values: &'a ValuesMap,
    flags: &'a KonfigureFlags,
    client: &'a HelmClient,
    log: LogContext,
}

impl<'a> HelmChart<'a> {
    pub fn new(
        instance: &'a Instance,
        konfig: &'a Konfiguration,
        env_values: &'a ValuesMap,
        flags: &'a KonfigureFlags,
        client: &'a HelmClient,
    ) -> Self {
        let log = LogContext::new(
            format!("{}/{}", instance.chart(), instance.name),
            flags.debug,
        );
        Self {
            instance,
            konfig,
            env_values,
            flags,
            client,
            log,
        }
    }

    pub fn render(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        self.log.blank();
        self.log.status(&format!("Rendering {}...", self.instance.name));
        self.run_chart_values_command(runner, &["template"])
    }

    pub fn deploy(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        self.log.blank();
        self.log.status(&format!("Deploying {}...", self.instance.name));
        self.run_chart_values_command(runner, &["upgrade", "--install"])
    }

    pub fn uninstall(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        self.log.blank();
        self.log.status(&format!("Uninstalling {}...", self.instance.name));
        self.run_chart_command(runner, &["uninstall"], Vec::new())
    }

    pub fn show(&self, runner: &mut dyn CommandRunner) -> Result<()> {
        self.run_chart_values_command(runner, &["show"])
    }

    /// Chart-scoped helm invocation: command args, then the kube context,
    /// namespace, and release name, then whatever the operation appends.
    fn run_chart_command(
        &self,
        runner: &mut dyn CommandRunner,
        command_args: &[&str],
        extra_args: Vec<String>,
    ) -> Result<()> {
        let env = self.konfig.environment();
        let mut args: Vec<String> = command_args.iter().map(|arg| arg.to_string()).collect();
        args.extend([
            "--kube-context".to_string(),
            shell::quote_arg(&env.k8s_context),
            "--namespace".to_string(),
            shell::quote_arg(&env.k8s_namespace),
            shell::quote_arg(&self.instance.name),
        ]);
        args.extend(extra_args);

        self.client.run_helm_command(runner, self.flags, &args)
    }

    /// Like `run_chart_command`, plus the chart reference, optional pinned
    /// version, and one `-f` file per non-empty values layer.
    fn run_chart_values_command(
        &self,
        runner: &mut dyn CommandRunner,
        command_args: &[&str],
    ) -> Result<()> {
        // The temp files must outlive the helm invocation below.
        let (mut value_args, _value_files) = self.prepare_value_files()?;

        let chart_arg = match self.instance.source() {
            ChartSource::Local => shell::quote_arg(self.instance.chart_path()),
            ChartSource::Remote => shell::quote_arg(&format!(
                "{}/{}",
                self.konfig.environment().chart_repo_name(),
                self.instance.chart()
            )),
        };
        let version_arg = match &self.instance.dep.version {
            Some(version) => format!("--version={}", shell::quote_arg(version)),
            None => String::new(),
        };

        let mut extra = vec![chart_arg, version_arg];
        extra.append(&mut value_args);
        self.run_chart_command(runner, command_args, extra)
    }

    fn prepare_value_files(&self) -> Result<(Vec<String>, Vec<NamedTempFile>)> {
        let layers = self.instance.prepare_values(self.konfig, self.env_values);

        self.log.debug("Writing values files...");
        let mut args = Vec::new();
        let mut files = Vec::new();
        for layer in layers.into_iter().filter(|layer| !layer.is_empty()) {
            let file = write_value_file(&layer, &self.log)?;
            args.push("-f".to_string());
            args.push(file.path().display().to_string());
            files.push(file);
        }
        Ok((args, files))
    }
}

/// Write one values layer as a JSON temp file helm can take via `-f`.
fn write_value_file(values: &ValuesMap, log: &LogContext) -> Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("konfigure-values-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| Error::internal_io(e.to_string(), Some("create values file".to_string())))?;

    log.debug(&format!("Writing values file {}...", file.path().display()));
    serde_json::to_writer(file.as_file(), &Value::Object(values.clone()))
        .map_err(|e| Error::internal_json(e.to_string(), Some("write values file".to_string())))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::konfig::{Deployment, Environment, ExternalResources, KonfigProps};
    use crate::logging::Level;
    use crate::session::CommandResult;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct RecordingRunner {
        commands: Vec<String>,
        exit_code: i32,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                commands: Vec::new(),
                exit_code: 0,
            }
        }

        fn failing(exit_code: i32) -> Self {
            Self {
                commands: Vec::new(),
                exit_code,
            }
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&mut self, command: &str) -> Result<CommandResult> {
            self.commands.push(command.to_string());
            Ok(CommandResult {
                exit_code: self.exit_code,
                output: String::new(),
            })
        }
    }

    fn test_log() -> LogContext {
        LogContext::with_level("helm", Level::Status)
    }

    fn test_konfig(deployments: BTreeMap<String, Deployment>) -> Konfiguration {
        let props = KonfigProps {
            api_version: "v4.15.0".to_string(),
            environment: Environment {
                name: None,
                tf_env: "test-env-dev".to_string(),
                tf_module: "test-env-dev".to_string(),
                aws_account: "test-account".to_string(),
                aws_region: "eu-west-1".to_string(),
                k8s_context: "test-env-nonprod".to_string(),
                k8s_namespace: "test-env-dev".to_string(),
                eks_nodegroup: "workers".to_string(),
                chart_repo: None,
            },
            chart_defaults: BTreeMap::new(),
            deployments,
            external_resources: ExternalResources::default(),
        };
        let dir = TempDir::new().unwrap();
        Konfiguration::from_props("test-env", dir.path().to_path_buf(), "konfig.yaml".into(), props)
            .unwrap()
    }

    fn chart_deployment(chart: &str) -> Deployment {
        Deployment {
            chart: Some(chart.to_string()),
            ..Deployment::default()
        }
    }

    fn no_flags() -> KonfigureFlags {
        KonfigureFlags::default()
    }

    #[test]
    fn dryrun_does_not_run_the_command() {
        let client = HelmClient::new(test_log());
        let mut runner = RecordingRunner::new();
        let flags = KonfigureFlags {
            dryrun: true,
            ..KonfigureFlags::default()
        };

        client
            .run_helm_command(&mut runner, &flags, &["repo".into(), "update".into()])
            .unwrap();
        assert!(runner.commands.is_empty());
    }

    #[test]
    fn debug_flag_appends_debug() {
        let client = HelmClient::new(test_log());
        let mut runner = RecordingRunner::new();
        let flags = KonfigureFlags {
            debug: true,
            ..KonfigureFlags::default()
        };

        client
            .run_helm_command(&mut runner, &flags, &["version".into()])
            .unwrap();
        assert!(runner.commands[0].contains("--debug"));
    }

    #[test]
    fn helm_args_are_appended_and_stderr_folded() {
        let client = HelmClient::new(test_log());
        let mut runner = RecordingRunner::new();

        client
            .run_helm_command(&mut runner, &no_flags(), &["repo".into(), "update".into()])
            .unwrap();
        assert_eq!(runner.commands[0], "helm repo update 2>&1");
    }

    #[test]
    fn nonzero_exit_is_a_helm_error() {
        let client = HelmClient::new(test_log());
        let mut runner = RecordingRunner::failing(3);

        let err = client
            .run_helm_command(&mut runner, &no_flags(), &["version".into()])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::HelmCommandFailed);
        assert_eq!(err.details["exitCode"], 3);
    }

    #[test]
    fn chart_command_carries_context_namespace_and_release() {
        let mut deployments = BTreeMap::new();
        deployments.insert("web".to_string(), chart_deployment("nginx"));
        let konfig = test_konfig(deployments);
        let env_values = ValuesMap::new();
        let flags = no_flags();
        let client = HelmClient::new(test_log());
        let chart = HelmChart::new(&konfig.instances["web"], &konfig, &env_values, &flags, &client);

        let mut runner = RecordingRunner::new();
        chart.uninstall(&mut runner).unwrap();

        let command = &runner.commands[0];
        assert!(command.starts_with("helm uninstall"));
        assert!(command.contains("--kube-context test-env-nonprod"));
        assert!(command.contains("--namespace test-env-dev"));
        assert!(command.contains(" web "));
        assert!(command.ends_with("2>&1"));
        assert!(!command.contains("  "));
    }

    #[test]
    fn deploy_references_remote_chart_with_repo_prefix() {
        let mut deployments = BTreeMap::new();
        deployments.insert(
            "web".to_string(),
            Deployment {
                version: Some("1.2.3".to_string()),
                ..chart_deployment("nginx")
            },
        );
        let konfig = test_konfig(deployments);
        let env_values = ValuesMap::new();
        let flags = no_flags();
        let client = HelmClient::new(test_log());
        let chart = HelmChart::new(&konfig.instances["web"], &konfig, &env_values, &flags, &client);

        let mut runner = RecordingRunner::new();
        chart.deploy(&mut runner).unwrap();

        let command = &runner.commands[0];
        assert!(command.starts_with("helm upgrade --install"));
        assert!(command.contains("fimbulvetr/nginx"));
        assert!(command.contains("--version=1.2.3"));
    }

    #[test]
    fn render_references_local_chart_by_path() {
        let mut deployments = BTreeMap::new();
        deployments.insert(
            "svc".to_string(),
            Deployment {
                source: Some(ChartSource::Local),
                ..chart_deployment("../charts/my-service")
            },
        );
        let konfig = test_konfig(deployments);
        let env_values = ValuesMap::new();
        let flags = no_flags();
        let client = HelmClient::new(test_log());
        let chart = HelmChart::new(&konfig.instances["svc"], &konfig, &env_values, &flags, &client);

        let mut runner = RecordingRunner::new();
        chart.render(&mut runner).unwrap();

        let command = &runner.commands[0];
        assert!(command.starts_with("helm template"));
        assert!(command.contains("../charts/my-service"));
        assert!(!command.contains("fimbulvetr"));
    }

    #[test]
    fn values_layers_become_dash_f_files() {
        let mut deployments = BTreeMap::new();
        deployments.insert(
            "web".to_string(),
            Deployment {
                values: Some(match json!({"replicas": 2}) {
                    Value::Object(map) => map,
                    _ => unreachable!(),
                }),
                ..chart_deployment("nginx")
            },
        );
        let konfig = test_konfig(deployments);
        let env_values = match json!({"region": "eu-west-1"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let flags = no_flags();
        let client = HelmClient::new(test_log());
        let chart = HelmChart::new(&konfig.instances["web"], &konfig, &env_values, &flags, &client);

        let mut runner = RecordingRunner::new();
        chart.deploy(&mut runner).unwrap();

        // Two non-empty layers: the environment values and the inline values.
        let command = &runner.commands[0];
        assert_eq!(command.matches(" -f ").count(), 2);
    }
}
