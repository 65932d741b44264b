use std::process::ExitCode;

fn main() -> ExitCode {
    zenbot_cli::run()
}
