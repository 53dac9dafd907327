//! repolens CLI binary.
//!
//! All logic is in the library; main.rs only maps the CLI result to a
//! process exit code.

fn main() {
    if let Err(code) = repolens::cli::run() {
        std::process::exit(code.as_i32());
    }
}
