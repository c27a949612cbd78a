fn main() {
    session_monitor::logging::init_tracing();
    match session_monitor::run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(error.exit_code());
        }
    }
}
