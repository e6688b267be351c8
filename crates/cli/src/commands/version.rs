use crate::commands::CommandResult;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn run() -> CommandResult {
    CommandResult { exit_code: 0, output: VERSION.to_owned() }
}
