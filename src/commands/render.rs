use clap::Args;
use serde::Serialize;

use konfigure::deploy::{self, InstanceOutcome};

use super::{CmdResult, CommonArgs, GlobalArgs, InstanceArgs};

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub instances: InstanceArgs,
}

#[derive(Serialize)]
pub struct RenderOutput {
    pub command: String,
    pub environment: String,
    pub dryrun: bool,
    pub instances: Vec<InstanceOutcome>,
}

pub fn run(args: RenderArgs, _global: &GlobalArgs) -> CmdResult<RenderOutput> {
    let mut ctx = super::init_context("render", &args.common, args.instances.instances)?;

    let instances =
        deploy::process_deployments(&mut ctx, "render", false, |chart, session| {
            chart.render(session)
        })?;
    ctx.close()?;

    Ok((
        RenderOutput {
            command: "render".to_string(),
            environment: args.common.environment.clone(),
            dryrun: args.common.dryrun,
            instances,
        },
        0,
    ))
}
