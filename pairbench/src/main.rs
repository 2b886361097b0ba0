use std::process::ExitCode;

fn main() -> ExitCode {
    match pairbench::run() {
        Ok(pairbench::RunStatus::Completed) => ExitCode::SUCCESS,
        Ok(pairbench::RunStatus::Aborted) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
