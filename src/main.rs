use clap::Parser;
use clap_probe_lib::config::Cli;
use clap_probe_lib::{logging, probe, report};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose, cli.log_file_path().as_deref()) {
        eprintln!("error: could not open log file: {}", e);
        std::process::exit(e.exit_code());
    }

    log::info!("clap-probe {} starting", env!("CARGO_PKG_VERSION"));

    let options = match cli.probe_options() {
        Ok(options) => options,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let probe_report = probe(&options);

    let output = if cli.json {
        match report::render_json(&probe_report) {
            Ok(json) => json + "\n",
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(e.exit_code());
            }
        }
    } else {
        report::render_text(&probe_report)
    };
    print!("{}", output);

    std::process::exit(probe_report.exit_code);
}
