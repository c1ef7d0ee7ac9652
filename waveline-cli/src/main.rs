//! # wave
//!
//! A terminal player for local audio files with gapless transitions,
//! crossfades and an equalizer.

mod cli;
mod config;
mod controls;
mod error;
mod logging;
mod playlist;
mod runner;
mod ui;

fn main() {
    dotenv::dotenv().ok();
    let log_sink = logging::init();
    let args = cli::args::build_cli().get_matches();

    let code = match runner::run(&args, log_sink) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{}", err);
            eprintln!("error: {}", err);
            1
        }
    };

    std::process::exit(code)
}
