//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = geotap_cli::run() {
        eprintln!("geotap: {err}");
        std::process::exit(1);
    }
}
