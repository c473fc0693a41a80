use anyhow::Context;
use clap::{Command, command};
use http_scaffold::console;

fn main() -> anyhow::Result<()> {
    let cli = console::commands()
        .iter()
        .fold(command!().subcommand_required(true), |cli, cmd| {
            cli.subcommand(Command::new(cmd.name).about(cmd.about))
        });
    let matches = cli.get_matches();

    let name = matches
        .subcommand_name()
        .context("No command given")?;
    let cmd = console::find(name).with_context(|| format!("Unknown command '{}'", name))?;

    http_scaffold::bootstrap().context("Failed to load the configuration")?;
    tracing::debug!("Running console command '{}'", cmd.name);

    (cmd.run)(&mut std::io::stdout().lock())
}
