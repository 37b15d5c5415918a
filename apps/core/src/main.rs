fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match pinboard_core::runtime::parse_cli_args(&args) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("[pinboard-core] {error}");
            std::process::exit(2);
        }
    };

    if let Err(error) = pinboard_core::runtime::run_with_options(options) {
        eprintln!("[pinboard-core] runtime failed: {error}");
        std::process::exit(1);
    }
}
