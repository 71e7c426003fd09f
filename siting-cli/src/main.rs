//! Entry point for the `siting` binary.
#![forbid(unsafe_code)]

#[expect(
    clippy::print_stderr,
    reason = "fatal errors are reported on stderr before exiting"
)]
fn main() {
    if let Err(err) = siting_cli::run() {
        eprintln!("siting: {err}");
        std::process::exit(1);
    }
}
