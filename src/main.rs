use acvalidator::cli::Args;
use acvalidator::commands::validate;
use acvalidator::utils::logging;
use clap::Parser;
use std::time::Instant;

fn main() {
    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_settings()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    let start = Instant::now();
    if let Err(e) = validate::run(&args) {
        log::error!("{:#}", e);
        std::process::exit(validate::exit_code(&e));
    }
    log::info!("Finished in {:.1?}", start.elapsed());
}
