use std::process;

fn main() {
    if let Err(err) = strata::app::run() {
        eprintln!("fatal: {err}");
        process::exit(1);
    }
}
