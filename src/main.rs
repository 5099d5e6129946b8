use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    devdoc::cli::main()
}
