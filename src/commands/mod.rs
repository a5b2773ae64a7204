use clap::Args;

use konfigure::context::{CommandContext, KonfigureFlags};
use konfigure::log_status;

pub type CmdResult<T> = konfigure::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

pub mod debug_pod;
pub mod deploy;
pub mod edit;
pub mod get_dns;
pub mod k9s;
pub mod redeploy;
pub mod render;
pub mod show;
pub mod teardown;

/// Arguments shared by every konfigure command.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// The environment konfiguration to use
    pub environment: String,

    /// Print out commands rather than executing
    #[arg(long)]
    pub dryrun: bool,

    /// Skip expensive operations during development
    #[arg(long)]
    pub testing: bool,

    /// Automatically authenticate with the appropriate AWS account
    #[arg(long)]
    pub auth: bool,

    /// Log out debug information
    #[arg(long)]
    pub debug: bool,

    /// Running in a CI environment
    #[arg(long)]
    pub cd: bool,

    /// The base directory to search for environments
    #[arg(long = "base-dir")]
    pub base_dir: Option<String>,
}

impl CommonArgs {
    pub fn flags(&self) -> KonfigureFlags {
        KonfigureFlags {
            dryrun: self.dryrun,
            testing: self.testing,
            auth: self.auth,
            debug: self.debug,
            cd: self.cd,
            base_dir: self.base_dir.clone(),
        }
    }
}

/// Trailing instance selection: `all`, `chart <charts…>`, or instance names.
#[derive(Args, Debug, Clone, Default)]
pub struct InstanceArgs {
    #[arg(value_name = "INSTANCES")]
    pub instances: Vec<String>,
}

pub(crate) fn log_mode(command_name: &str, flags: &KonfigureFlags) {
    log_status!("cli", "running {}", command_name);

    if flags.dryrun {
        log_status!("cli", "dryrun flag set: printing commands instead of executing");
    }
    if flags.testing {
        log_status!("cli", "testing flag set: skipping repo updates");
    }
    if flags.auth {
        log_status!("cli", "auth flag set: automatically authenticating");
    }
    if flags.debug {
        log_status!("cli", "debug mode enabled");
    }
}

pub(crate) fn init_context(
    command_name: &str,
    common: &CommonArgs,
    instances: Vec<String>,
) -> konfigure::Result<CommandContext> {
    let flags = common.flags();
    log_mode(command_name, &flags);
    CommandContext::init(&common.environment, instances, flags)
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (konfigure::Result<serde_json::Value>, i32) {
    use crate::output::map_cmd_result_to_json;
    use crate::Commands;

    match command {
        Commands::Deploy(args) => map_cmd_result_to_json(deploy::run(args, global)),
        Commands::Redeploy(args) => map_cmd_result_to_json(redeploy::run(args, global)),
        Commands::Render(args) => map_cmd_result_to_json(render::run(args, global)),
        Commands::Teardown(args) => map_cmd_result_to_json(teardown::run(args, global)),
        Commands::GetDns(args) => map_cmd_result_to_json(get_dns::run(args, global)),
        Commands::K9s(args) => map_cmd_result_to_json(k9s::run(args, global)),
        Commands::DebugPod(args) => map_cmd_result_to_json(debug_pod::run(args, global)),
        Commands::Edit(args) => map_cmd_result_to_json(edit::run(args, global)),
        Commands::Show(args) => map_cmd_result_to_json(show::run(args, global)),
    }
}
