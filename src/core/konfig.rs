//! Per-environment deployment konfiguration.
//!
//! An environment directory (`env/<name>/`) holds one konfiguration file
//! plus optional per-chart and per-deployment values files. The
//! konfiguration declares chart defaults, deployment instances, and
//! external resources; instances are assembled by overlaying each
//! deployment entry on the defaults for its chart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::KonfigureFlags;
use crate::error::{Error, Result};
use crate::files;
use crate::log_status;

/// Arbitrarily nested values passed to Helm.
pub type ValuesMap = serde_json::Map<String, Value>;

/// Chart every external resource is rendered with.
pub const EXTERNAL_SERVICE_CHART: &str = "external-service";

/// Remote chart repository used when the environment does not name one.
pub const DEFAULT_CHART_REPO: &str = "fimbulvetr";

/// Filenames probed, in order, when detecting an environment's konfiguration.
const KONFIG_FILENAMES: [&str; 4] = ["konfig.yaml", "config.yaml", "konfig.json", "config.json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KonfigProps {
    pub api_version: String,
    pub environment: Environment,
    #[serde(default)]
    pub chart_defaults: BTreeMap<String, Deployment>,
    #[serde(default)]
    pub deployments: BTreeMap<String, Deployment>,
    #[serde(default)]
    pub external_resources: ExternalResources,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tf_env: String,
    pub tf_module: String,
    pub aws_account: String,
    pub aws_region: String,
    pub k8s_context: String,
    pub k8s_namespace: String,
    pub eks_nodegroup: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_repo: Option<String>,
}

impl Environment {
    pub fn chart_repo_name(&self) -> &str {
        self.chart_repo.as_deref().unwrap_or(DEFAULT_CHART_REPO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentKind {
    Helm,
    Cdk8s,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DeploymentKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ChartSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<ValuesMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cd_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nest_values: Option<bool>,
}

impl Deployment {
    /// Overlay a deployment entry on the defaults configured for its chart.
    /// The defaults' inline `values` stay out of the merge; they enter the
    /// values precedence chain as their own layer.
    fn over(defaults: &Deployment, dep: &Deployment) -> Deployment {
        Deployment {
            chart: dep.chart.clone().or_else(|| defaults.chart.clone()),
            kind: dep.kind.or(defaults.kind),
            source: dep.source.or(defaults.source),
            version: dep.version.clone().or_else(|| defaults.version.clone()),
            values: dep.values.clone(),
            disabled: dep.disabled.or(defaults.disabled),
            cd_disabled: dep.cd_disabled.or(defaults.cd_disabled),
            nest_values: dep.nest_values.or(defaults.nest_values),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResources {
    #[serde(default)]
    pub secret_presets: BTreeMap<String, ValuesMap>,
    #[serde(default)]
    pub deployments: BTreeMap<String, ExternalResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ExternalService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_secrets: Option<ValuesMap>,
    #[serde(rename = "$secretPreset", default, skip_serializing_if = "Option::is_none")]
    pub secret_preset: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalService {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// One deployable unit: a named deployment with its chart defaults applied.
#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub name: String,
    pub dep: Deployment,
}

impl Instance {
    /// Chart name. Local charts are referenced by filesystem path, so the
    /// name is the path basename; remote charts use the reference as-is.
    pub fn chart(&self) -> &str {
        let path = self.chart_path();
        match self.source() {
            ChartSource::Local => Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path),
            ChartSource::Remote => path,
        }
    }

    /// The raw chart reference as configured.
    pub fn chart_path(&self) -> &str {
        self.dep.chart.as_deref().unwrap_or_default()
    }

    pub fn kind(&self) -> DeploymentKind {
        self.dep.kind.unwrap_or(DeploymentKind::Helm)
    }

    pub fn source(&self) -> ChartSource {
        self.dep.source.unwrap_or(ChartSource::Remote)
    }

    pub fn is_enabled(&self, flags: &KonfigureFlags) -> bool {
        let disabled = self.dep.disabled.unwrap_or(false);
        let cd_disabled = self.dep.cd_disabled.unwrap_or(false);
        !disabled && !(flags.cd && cd_disabled)
    }

    /// Value layers for this instance, lowest precedence first:
    /// environment-computed values, per-env chart-default file,
    /// chart-default inline values, per-deployment file, deployment inline
    /// values.
    pub fn prepare_values(&self, konfig: &Konfiguration, env_values: &ValuesMap) -> Vec<ValuesMap> {
        let env_layer = if self.dep.nest_values.unwrap_or(false) {
            let mut nested = ValuesMap::new();
            nested.insert(self.chart().to_string(), Value::Object(env_values.clone()));
            nested
        } else {
            env_values.clone()
        };

        vec![
            env_layer,
            konfig.read_chart_default_values(self.chart()),
            konfig
                .chart_defaults(self.chart())
                .and_then(|d| d.values.clone())
                .unwrap_or_default(),
            konfig.read_deployment_values(&self.name),
            self.dep.values.clone().unwrap_or_default(),
        ]
    }
}

pub struct Konfiguration {
    pub name: String,
    pub env_dir: PathBuf,
    pub filename: String,
    pub props: KonfigProps,
    pub instances: BTreeMap<String, Instance>,
}

impl Konfiguration {
    pub fn read(env_name: &str, base_dir: Option<&str>) -> Result<Self> {
        log_status!("konfig", "Reading konfiguration...");

        let (env_dir, filename) = Self::detect_konfig_file(env_name, base_dir)?;
        let path = env_dir.join(&filename);
        let props: KonfigProps = files::read_config_file(&path)?;

        Self::from_props(env_name, env_dir, filename, props)
    }

    /// Assemble a konfiguration from already-parsed props.
    pub fn from_props(
        env_name: &str,
        env_dir: PathBuf,
        filename: String,
        props: KonfigProps,
    ) -> Result<Self> {
        let mut instances = parse_instances(&props)?;
        instances.append(&mut parse_external_resources(&props)?);

        Ok(Self {
            name: env_name.to_string(),
            env_dir,
            filename,
            props,
            instances,
        })
    }

    /// Probe the environment directory for a konfiguration file.
    pub fn detect_konfig_file(env_name: &str, base_dir: Option<&str>) -> Result<(PathBuf, String)> {
        let base = match base_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).into_owned()),
            None => std::env::current_dir()
                .map_err(|e| Error::internal_io(e.to_string(), Some("resolve cwd".to_string())))?,
        };
        let env_dir = base.join("env").join(env_name);

        for filename in KONFIG_FILENAMES {
            if env_dir.join(filename).is_file() {
                return Ok((env_dir, filename.to_string()));
            }
        }

        Err(Error::konfig_not_found(
            env_name,
            &env_dir.display().to_string(),
        ))
    }

    pub fn konfig_path(&self) -> PathBuf {
        self.env_dir.join(&self.filename)
    }

    pub fn environment(&self) -> &Environment {
        &self.props.environment
    }

    pub fn chart_defaults(&self, chart: &str) -> Option<&Deployment> {
        self.props.chart_defaults.get(chart)
    }

    pub fn chart_defaults_values_path(&self, chart: &str) -> PathBuf {
        self.env_dir
            .join("chartDefaults")
            .join(format!("{}.yaml", chart))
    }

    pub fn deployments_values_path(&self, deployment: &str) -> PathBuf {
        self.env_dir
            .join("deployments")
            .join(format!("{}.yaml", deployment))
    }

    pub fn read_chart_default_values(&self, chart: &str) -> ValuesMap {
        files::read_optional_values_file(&self.chart_defaults_values_path(chart))
    }

    pub fn read_deployment_values(&self, deployment: &str) -> ValuesMap {
        files::read_optional_values_file(&self.deployments_values_path(deployment))
    }

    /// Select instances by the trailing CLI arguments: `all`, `chart
    /// <charts…>`, or explicit instance names. Disabled instances are always
    /// filtered out.
    pub fn filter_deployments(&self, filter: &[String], flags: &KonfigureFlags) -> Vec<&Instance> {
        let predicate: Box<dyn Fn(&Instance) -> bool> = match filter.first().map(String::as_str) {
            Some("all") => {
                log_status!("konfig", "Processing all deployments");
                if filter.len() > 1 {
                    log_status!(
                        "konfig",
                        "Additional instances specified after 'all' keyword, will be ignored."
                    );
                }
                Box::new(|_| true)
            }
            Some("chart") => {
                let charts: Vec<String> = filter[1..].to_vec();
                log_status!(
                    "konfig",
                    "Limiting to instances of chart{}: {}",
                    if charts.len() > 1 { "s" } else { "" },
                    charts.join(", ")
                );
                Box::new(move |instance| charts.iter().any(|c| c == instance.chart()))
            }
            _ => {
                log_status!("konfig", "Limiting to: {}", filter.join(", "));
                let names: Vec<String> = filter.to_vec();
                Box::new(move |instance| names.contains(&instance.name))
            }
        };

        self.instances
            .values()
            .filter(|instance| predicate(instance) && instance.is_enabled(flags))
            .collect()
    }

    pub fn header(&self) -> String {
        let env = self.environment();
        format!(
            "konfiguration {}\n\n\
             Initializing deployment environment '{}'...\n\
             Terraform environment: '{}'\n\
             AWS account: '{}'\n\
             AWS region: '{}'\n\
             K8s context: '{}'\n\
             K8s namespace: '{}'",
            self.props.api_version,
            self.name,
            env.tf_env,
            env.aws_account,
            env.aws_region,
            env.k8s_context,
            env.k8s_namespace,
        )
    }

    pub fn log_header(&self) {
        for line in self.header().lines() {
            if line.is_empty() {
                log_status!("konfig", " ");
            } else {
                log_status!("konfig", "{}", line);
            }
        }
    }
}

fn parse_instances(props: &KonfigProps) -> Result<BTreeMap<String, Instance>> {
    props
        .deployments
        .iter()
        .map(|(name, dep)| {
            let defaults = dep
                .chart
                .as_ref()
                .and_then(|chart| props.chart_defaults.get(chart))
                .cloned()
                .unwrap_or_default();
            let merged = Deployment::over(&defaults, dep);

            if merged.chart.is_none() {
                return Err(Error::konfig_invalid_value(
                    "chart",
                    format!("Deployment '{}' has no chart configured", name),
                ));
            }

            Ok((
                name.clone(),
                Instance {
                    name: name.clone(),
                    dep: merged,
                },
            ))
        })
        .collect()
}

fn parse_external_resources(props: &KonfigProps) -> Result<BTreeMap<String, Instance>> {
    let resources = &props.external_resources;

    resources
        .deployments
        .iter()
        .map(|(name, resource)| {
            let defaults = props
                .chart_defaults
                .get(EXTERNAL_SERVICE_CHART)
                .cloned()
                .unwrap_or_default();

            // The resource body becomes the instance's inline values, laid
            // over the preset-resolved externalSecrets.
            let mut values = ValuesMap::new();
            let preset = resource
                .secret_preset
                .as_ref()
                .and_then(|preset| resources.secret_presets.get(preset))
                .cloned()
                .unwrap_or_default();
            values.insert("externalSecrets".to_string(), Value::Object(preset));

            let body = serde_json::to_value(resource).map_err(|e| {
                Error::internal_json(e.to_string(), Some("serialize external resource".to_string()))
            })?;
            if let Value::Object(body) = body {
                for (key, value) in body {
                    values.insert(key, value);
                }
            }

            let mut dep = Deployment::over(
                &defaults,
                &Deployment {
                    values: Some(values),
                    ..Deployment::default()
                },
            );
            if dep.chart.is_none() {
                dep.chart = Some(EXTERNAL_SERVICE_CHART.to_string());
            }

            Ok((
                name.clone(),
                Instance {
                    name: name.clone(),
                    dep,
                },
            ))
        })
        .collect()
}
