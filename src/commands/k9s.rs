use clap::Args;
use serde::Serialize;

use konfigure::log_status;
use konfigure::toolkit;
use konfigure::utils::shell;

use super::{CmdResult, CommonArgs, GlobalArgs};

#[derive(Args)]
pub struct K9sArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Serialize)]
pub struct K9sOutput {
    pub command: String,
    pub environment: String,
    pub exit_code: i32,
}

pub fn run(args: K9sArgs, _global: &GlobalArgs) -> CmdResult<K9sOutput> {
    let mut ctx = super::init_context("k9s", &args.common, Vec::new())?;
    ctx.handle_auth()?;

    let environment = ctx.konfig.environment().clone();
    log_status!(
        "k9s",
        "Launching k9s in context '{}', namespace '{}'",
        environment.k8s_context,
        environment.k8s_namespace
    );

    let k9s_command = format!(
        "k9s --context {} --namespace {} -c deployments",
        shell::quote_arg(&environment.k8s_context),
        shell::quote_arg(&environment.k8s_namespace)
    );

    let exit_code = if ctx.flags.dryrun {
        log_status!("k9s", "{}", k9s_command);
        0
    } else {
        toolkit::run_toolkit_command(&k9s_command)?
    };
    ctx.close()?;

    Ok((
        K9sOutput {
            command: "k9s".to_string(),
            environment: args.common.environment.clone(),
            exit_code,
        },
        exit_code,
    ))
}
