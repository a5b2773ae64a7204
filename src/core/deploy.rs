//! Deployment processing across the filtered instances of an environment.

use serde::Serialize;
use serde_json::{json, Value};

use crate::context::CommandContext;
use crate::error::Result;
use crate::helm::HelmChart;
use crate::konfig::{ChartSource, DeploymentKind, Environment, ValuesMap};
use crate::log_status;
use crate::session::ShellSession;

/// What happened to one instance during a processing run.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceOutcome {
    pub name: String,
    pub chart: String,
    pub action: String,
}

/// Values computed from the environment itself, fed to every chart as the
/// lowest-precedence layer.
pub fn environment_values(environment: &Environment) -> ValuesMap {
    let value = json!({
        "region": environment.aws_region,
        "nodegroup": environment.eks_nodegroup,
        "nodeSelector": {
            "eks.amazonaws.com/nodegroup": environment.eks_nodegroup,
        },
    });
    match value {
        Value::Object(map) => map,
        _ => ValuesMap::new(),
    }
}

/// Filter the environment's instances and run `action` against each one's
/// chart. Repositories are refreshed first when any enabled instance uses a
/// remote helm chart (skipped under `--testing` or when the caller asks).
pub fn process_deployments<F>(
    ctx: &mut CommandContext,
    action_name: &str,
    skip_repo_update: bool,
    action: F,
) -> Result<Vec<InstanceOutcome>>
where
    F: Fn(&HelmChart<'_>, &mut ShellSession) -> Result<()>,
{
    let CommandContext {
        konfig,
        session,
        flags,
        filter,
        helm,
        ..
    } = ctx;

    let instances = konfig.filter_deployments(filter, flags);
    if instances.is_empty() {
        log_status!("deploy", "No deployments configured, nothing to do. Exiting!");
        return Ok(Vec::new());
    }

    let remote_helm_charts_present = instances
        .iter()
        .any(|i| i.kind() == DeploymentKind::Helm && i.source() == ChartSource::Remote);
    if !flags.testing && !skip_repo_update && remote_helm_charts_present {
        helm.update_repos(session, flags)?;
    }

    let env_values = environment_values(konfig.environment());

    let mut outcomes = Vec::new();
    for instance in instances {
        let chart = HelmChart::new(instance, konfig, &env_values, flags, helm);
        action(&chart, session)?;
        outcomes.push(InstanceOutcome {
            name: instance.name.clone(),
            chart: instance.chart().to_string(),
            action: action_name.to_string(),
        });
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_values_pin_the_nodegroup() {
        let environment = Environment {
            name: None,
            tf_env: "t".to_string(),
            tf_module: "t".to_string(),
            aws_account: "a".to_string(),
            aws_region: "eu-west-1".to_string(),
            k8s_context: "c".to_string(),
            k8s_namespace: "n".to_string(),
            eks_nodegroup: "workers-a".to_string(),
            chart_repo: None,
        };

        let values = environment_values(&environment);
        assert_eq!(values["region"], "eu-west-1");
        assert_eq!(values["nodegroup"], "workers-a");
        assert_eq!(values["nodeSelector"]["eks.amazonaws.com/nodegroup"], "workers-a");
    }
}
