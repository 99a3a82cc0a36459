use palaver::cli::Reported;

fn main() {
    if let Err(err) = palaver::cli::main() {
        if !err.is::<Reported>() {
            eprintln!("❌ Error: {err}");
        }
        std::process::exit(1);
    }
}
