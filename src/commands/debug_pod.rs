use clap::Args;
use serde::Serialize;

use konfigure::log_status;
use konfigure::session::run_one_shot;

use super::{CmdResult, CommonArgs, GlobalArgs};

#[derive(Args)]
pub struct DebugPodArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Serialize)]
pub struct DebugPodOutput {
    pub command: String,
    pub environment: String,
    pub exit_code: i32,
}

pub fn run(args: DebugPodArgs, _global: &GlobalArgs) -> CmdResult<DebugPodOutput> {
    let mut ctx = super::init_context("debug-pod", &args.common, Vec::new())?;

    // Debug pods are pinned to the environment's first availability zone.
    let zone = format!("{}a", ctx.konfig.environment().aws_region);
    let debug_command = format!("k8sDebugPod --az {}", zone);

    let exit_code = if ctx.flags.dryrun {
        log_status!("debug-pod", "{}", debug_command);
        0
    } else {
        run_one_shot(&debug_command)?
    };
    ctx.close()?;

    Ok((
        DebugPodOutput {
            command: "debug-pod".to_string(),
            environment: args.common.environment.clone(),
            exit_code,
        },
        exit_code,
    ))
}
