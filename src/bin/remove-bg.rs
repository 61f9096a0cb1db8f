//! Background removal CLI tool
//!
//! Usage: `remove-bg <INPUT_PATH> <OUTPUT_PATH>`

#[cfg(feature = "cli")]
fn main() -> std::process::ExitCode {
    remove_bg::cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
