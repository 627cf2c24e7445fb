mod beeminder;
mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod sync;

use crate::error::ExitCode;

fn main() {
    env_loader::load_dotenv();
    logging::init();

    match cli::run() {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(ExitCode::SetupFailed.as_i32());
        }
    }
}
