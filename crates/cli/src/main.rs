use std::process::ExitCode;

fn main() -> ExitCode {
    huddle_cli::run()
}
