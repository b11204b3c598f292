use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(mclick::cli::run_from_args(std::env::args_os()))
}
