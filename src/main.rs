use std::process::ExitCode;

fn main() -> ExitCode {
    match dataset_analyzer::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
