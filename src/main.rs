use clap::Parser;
use std::process::ExitCode;

mod app;
mod cli;
mod display;
mod logging;
mod utils;

use crate::app::Application;
use crate::cli::{Args, Command};
use cortex::{Settings, StackCatalog};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Some(shell) = args.init {
        print!("{}", app::init_script(shell));
        return ExitCode::SUCCESS;
    }

    let mut request = None;
    if let Some(Command::Stack(stack)) = &args.command {
        let machine_output = args.suggest || args.json;
        let prepared = StackCatalog::load().and_then(|catalog| {
            app::prepare_stack(stack, &catalog, cortex::system::has_nvidia_gpu(), machine_output)
        });
        match prepared {
            Ok(Some(stack_request)) => request = Some(stack_request),
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => {
                display::error(&e.to_string());
                return ExitCode::FAILURE;
            }
        }
    }

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            display::error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let result = match Application::new(args, &settings) {
        Ok(app) => app.run(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
