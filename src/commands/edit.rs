use clap::Args;
use serde::Serialize;

use konfigure::log_status;
use konfigure::session::run_one_shot;
use konfigure::utils::shell;

use super::{CmdResult, CommonArgs, GlobalArgs};

#[derive(Args)]
pub struct EditArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Serialize)]
pub struct EditOutput {
    pub command: String,
    pub environment: String,
    pub path: String,
    pub exit_code: i32,
}

pub fn run(args: EditArgs, _global: &GlobalArgs) -> CmdResult<EditOutput> {
    let mut ctx = super::init_context("edit", &args.common, Vec::new())?;

    let path = ctx.konfig.konfig_path().display().to_string();
    log_status!(
        "edit",
        "Opening konfig for environment '{}' in editor...",
        ctx.konfig.name
    );

    // $EDITOR is expanded by the one-shot shell itself.
    let exit_code = run_one_shot(&format!("$EDITOR {}", shell::quote_path(&path)))?;
    ctx.close()?;

    Ok((
        EditOutput {
            command: "edit".to_string(),
            environment: args.common.environment.clone(),
            path,
            exit_code,
        },
        exit_code,
    ))
}
