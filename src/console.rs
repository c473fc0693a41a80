//! Commands which can be invoked via the `console` binary.
//!
//! Each command is registered under a namespaced name like `default/hello-world`
//! and writes its output to the given writer.

use anyhow::Context;
use std::io::Write;

pub struct Command {
    pub name: &'static str,
    pub about: &'static str,
    pub run: fn(&mut dyn Write) -> anyhow::Result<()>,
}

const COMMANDS: &[Command] = &[Command {
    name: "default/hello-world",
    about: "Prints a greeting to verify the console setup",
    run: hello_world,
}];

pub fn commands() -> &'static [Command] {
    COMMANDS
}

pub fn find(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|command| command.name == name)
}

fn hello_world(out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "hello world").context("Failed to write to console")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_world_greets() {
        let command = find("default/hello-world").unwrap();
        let mut out = Vec::new();

        (command.run)(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "hello world\n");
    }

    #[test]
    fn unknown_commands_are_not_found() {
        assert!(find("default/unknown").is_none());
        assert!(commands().iter().all(|command| command.name.contains('/')));
    }
}
