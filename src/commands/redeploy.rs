use clap::Args;
use serde::Serialize;

use konfigure::deploy::{self, InstanceOutcome};

use super::{CmdResult, CommonArgs, GlobalArgs, InstanceArgs};

#[derive(Args)]
pub struct RedeployArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub instances: InstanceArgs,
}

#[derive(Serialize)]
pub struct RedeployOutput {
    pub command: String,
    pub environment: String,
    pub dryrun: bool,
    pub instances: Vec<InstanceOutcome>,
}

pub fn run(args: RedeployArgs, _global: &GlobalArgs) -> CmdResult<RedeployOutput> {
    let mut ctx = super::init_context("redeploy", &args.common, args.instances.instances)?;
    ctx.handle_auth()?;

    let instances =
        deploy::process_deployments(&mut ctx, "redeploy", false, |chart, session| {
            chart.uninstall(session)?;
            chart.deploy(session)
        })?;
    ctx.close()?;

    Ok((
        RedeployOutput {
            command: "redeploy".to_string(),
            environment: args.common.environment.clone(),
            dryrun: args.common.dryrun,
            instances,
        },
        0,
    ))
}
