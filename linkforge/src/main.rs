use commands::command_argument_builder;
use linkforge::handlers::{
    handle_import, handle_init, handle_plan, handle_report, handle_restore,
};
use linkforge_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("import", primary_command)) => handle_import(primary_command),
        Some(("plan", primary_command)) => handle_plan(primary_command).await,
        Some(("report", primary_command)) => handle_report(primary_command),
        Some(("restore", primary_command)) => handle_restore(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
