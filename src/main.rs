use ocbox::cli::{CliInvocation, help_text, parse_invocation, run_command};
use ocbox::service::SessionService;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let invocation = match parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{}", help_text());
            return ExitCode::FAILURE;
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            println!("{}", help_text());
            ExitCode::SUCCESS
        }
        CliInvocation::PrintVersion => {
            println!("ocbox {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        CliInvocation::Command(command) => {
            let service = match SessionService::open_default() {
                Ok(service) => service,
                Err(error) => {
                    eprintln!("error: {error}");
                    return ExitCode::FAILURE;
                }
            };

            match run_command(&service, command) {
                Ok(()) => ExitCode::SUCCESS,
                Err(error) => {
                    eprintln!("error: {error}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
