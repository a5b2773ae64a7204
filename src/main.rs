use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    InteractivePassthrough,
}

mod commands;
mod output;
mod tty;

use commands::{
    debug_pod, deploy, edit, get_dns, k9s, redeploy, render, show, teardown, GlobalArgs,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "konfigure")]
#[command(version = VERSION)]
#[command(about = "Konfigures workloads deployed onto Kubernetes, both application configuration and auxiliary resources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Render and deploy targeted instances to the current environment
    Deploy(deploy::DeployArgs),
    /// Teardown and then deploy targeted instances to the current environment
    Redeploy(redeploy::RedeployArgs),
    /// Substitute values and render manifests for the targeted deployments
    Render(render::RenderArgs),
    /// Tear down instances from the current environment
    Teardown(teardown::TeardownArgs),
    /// Query the provisioned DNS name for the targeted deployments
    GetDns(get_dns::GetDnsArgs),
    /// Launch k9s in the current environment
    K9s(k9s::K9sArgs),
    /// Launch a debug pod in the current environment
    DebugPod(debug_pod::DebugPodArgs),
    /// Open the konfig file for the current environment in your editor
    Edit(edit::EditArgs),
    /// Show the konfiguration for an environment
    Show(show::ShowArgs),
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::K9s(_) | Commands::DebugPod(_) | Commands::Edit(_) => {
            ResponseMode::InteractivePassthrough
        }
        _ => ResponseMode::Json,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let mode = response_mode(&cli.command);

    if let ResponseMode::InteractivePassthrough = mode {
        if !tty::require_tty_for_interactive() {
            let err = konfigure::Error::validation_invalid_argument(
                "tty",
                "This command requires an interactive TTY",
                None,
                None,
            );
            let _ = output::print_result::<serde_json::Value>(Err(err));
            return std::process::ExitCode::from(exit_code_to_u8(2));
        }
    }

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    match mode {
        ResponseMode::Json => {
            let _ = output::print_json_result(json_result);
        }
        ResponseMode::InteractivePassthrough => {}
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
