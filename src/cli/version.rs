/// Display version information
pub fn execute() {
    println!("tether {}", env!("CARGO_PKG_VERSION"));
    println!("Chat session relay agent");
}
