//! EqoStack backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    if let Err(e) = eqostack_backend::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
