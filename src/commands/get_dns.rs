use clap::Args;
use serde::Serialize;

use konfigure::log_status;
use konfigure::toolkit;
use konfigure::utils::shell;

use super::{CmdResult, CommonArgs, GlobalArgs, InstanceArgs};

#[derive(Args)]
pub struct GetDnsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub instances: InstanceArgs,
}

#[derive(Serialize)]
pub struct DnsQueryResult {
    pub instance: String,
    pub exit_code: i32,
}

#[derive(Serialize)]
pub struct GetDnsOutput {
    pub command: String,
    pub environment: String,
    pub dryrun: bool,
    pub results: Vec<DnsQueryResult>,
}

pub fn run(args: GetDnsArgs, _global: &GlobalArgs) -> CmdResult<GetDnsOutput> {
    let mut ctx = super::init_context("get-dns", &args.common, args.instances.instances)?;
    ctx.handle_auth()?;

    let environment = ctx.konfig.environment().clone();
    let selected: Vec<String> = ctx
        .konfig
        .filter_deployments(&ctx.filter, &ctx.flags)
        .iter()
        .map(|instance| instance.name.clone())
        .collect();

    if selected.is_empty() {
        log_status!("dns", "No deployments configured, nothing to do. Exiting!");
        ctx.close()?;
        return Ok((
            GetDnsOutput {
                command: "get-dns".to_string(),
                environment: args.common.environment.clone(),
                dryrun: args.common.dryrun,
                results: Vec::new(),
            },
            0,
        ));
    }

    let mut results = Vec::new();
    for instance in selected {
        log_status!(
            "dns",
            "Querying DNS name for instance '{}' in '{}:{}'...",
            instance,
            environment.k8s_namespace,
            environment.k8s_context
        );

        // The cluster name behind the kube context is resolved by the
        // toolkit at execution time, hence the command substitution.
        let dns_command = format!(
            "awsEksServiceGetExternalDns {} $(awsEksGetContextClusterName {}) {} {}",
            shell::quote_arg(&environment.aws_account),
            shell::quote_arg(&environment.k8s_context),
            shell::quote_arg(&environment.k8s_namespace),
            shell::quote_arg(&instance)
        );

        let exit_code = if ctx.flags.dryrun {
            log_status!("dns", "{}", dns_command);
            0
        } else {
            toolkit::run_toolkit_command(&dns_command)?
        };
        results.push(DnsQueryResult {
            instance,
            exit_code,
        });
    }
    ctx.close()?;

    let exit_code = if results.iter().any(|r| r.exit_code != 0) {
        1
    } else {
        0
    };

    Ok((
        GetDnsOutput {
            command: "get-dns".to_string(),
            environment: args.common.environment.clone(),
            dryrun: args.common.dryrun,
            results,
        },
        exit_code,
    ))
}
