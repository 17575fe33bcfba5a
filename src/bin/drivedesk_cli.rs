use drivedesk::cli::run_cli;

fn main() {
    // Tracing is initialised by the shell once the configured filter is known.
    if let Err(err) = run_cli() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
