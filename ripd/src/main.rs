use ripd::cli::initialize_from_arguments;
use ripd_core::shutdown::ExitStatus;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("ripd v{}", env!("CARGO_PKG_VERSION"));
    match initialize_from_arguments().await? {
        ExitStatus::Status(code) => std::process::exit(code as i32),
        ExitStatus::Exited | ExitStatus::EndOfStream => {
            println!("Done");
            Ok(())
        }
    }
}
