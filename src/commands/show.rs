use clap::Args;
use serde::Serialize;

use konfigure::konfig::{Konfiguration, KonfigProps};

use super::{CmdResult, CommonArgs, GlobalArgs};

#[derive(Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Serialize)]
pub struct ShowOutput {
    pub command: String,
    pub environment: String,
    pub header: String,
    pub konfiguration: KonfigProps,
}

pub fn run(args: ShowArgs, _global: &GlobalArgs) -> CmdResult<ShowOutput> {
    let flags = args.common.flags();
    super::log_mode("show", &flags);

    // Read-only: no session is needed to display a konfiguration.
    let konfig = Konfiguration::read(&args.common.environment, flags.base_dir.as_deref())?;

    Ok((
        ShowOutput {
            command: "show".to_string(),
            environment: args.common.environment.clone(),
            header: konfig.header(),
            konfiguration: konfig.props,
        },
        0,
    ))
}
