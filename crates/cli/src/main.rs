use std::process::ExitCode;

fn main() -> ExitCode {
    quote_pricing_cli::run()
}
