use std::process::ExitCode;

fn main() -> ExitCode {
    mavbot_cli::run()
}
