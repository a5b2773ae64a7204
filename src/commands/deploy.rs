use clap::Args;
use serde::Serialize;

use konfigure::deploy::{self, InstanceOutcome};

use super::{CmdResult, CommonArgs, GlobalArgs, InstanceArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub instances: InstanceArgs,
}

#[derive(Serialize)]
pub struct DeployOutput {
    pub command: String,
    pub environment: String,
    pub dryrun: bool,
    pub instances: Vec<InstanceOutcome>,
}

pub fn run(args: DeployArgs, _global: &GlobalArgs) -> CmdResult<DeployOutput> {
    let mut ctx = super::init_context("deploy", &args.common, args.instances.instances)?;
    ctx.handle_auth()?;
    ctx.ensure_namespace()?;

    let instances =
        deploy::process_deployments(&mut ctx, "deploy", false, |chart, session| {
            chart.deploy(session)
        })?;
    ctx.close()?;

    Ok((
        DeployOutput {
            command: "deploy".to_string(),
            environment: args.common.environment.clone(),
            dryrun: args.common.dryrun,
            instances,
        },
        0,
    ))
}
