use std::process::ExitCode;

fn main() -> ExitCode {
    homie_cli::run()
}
