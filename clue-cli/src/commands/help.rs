use std::io::Write;

use anyhow::Result;

use crate::commands::ClueCommand;
use crate::context::ClueContext;

pub struct HelpCommand;

impl ClueCommand for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn help(&self) -> &'static str {
        "Show this help"
    }

    fn execute(&self, ctx: &mut ClueContext, _args: &[String], out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Available commands:")?;
        for command in ctx.registry().commands() {
            let synopsis = match command.usage() {
                "" => command.name().to_string(),
                usage => format!("{} {}", command.name(), usage),
            };
            writeln!(out, "  {synopsis:<34} {}", command.help())?;
        }
        writeln!(out, "  {:<34} {}", "exit", "Leave the shell")?;
        Ok(())
    }
}
