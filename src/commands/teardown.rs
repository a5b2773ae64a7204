use clap::Args;
use serde::Serialize;

use konfigure::deploy::{self, InstanceOutcome};

use super::{CmdResult, CommonArgs, GlobalArgs, InstanceArgs};

#[derive(Args)]
pub struct TeardownArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub instances: InstanceArgs,
}

#[derive(Serialize)]
pub struct TeardownOutput {
    pub command: String,
    pub environment: String,
    pub dryrun: bool,
    pub instances: Vec<InstanceOutcome>,
}

pub fn run(args: TeardownArgs, _global: &GlobalArgs) -> CmdResult<TeardownOutput> {
    let mut ctx = super::init_context("teardown", &args.common, args.instances.instances)?;
    ctx.handle_auth()?;

    // Uninstalls never need fresh chart repositories.
    let instances =
        deploy::process_deployments(&mut ctx, "teardown", true, |chart, session| {
            chart.uninstall(session)
        })?;
    ctx.close()?;

    Ok((
        TeardownOutput {
            command: "teardown".to_string(),
            environment: args.common.environment.clone(),
            dryrun: args.common.dryrun,
            instances,
        },
        0,
    ))
}
