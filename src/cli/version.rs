/// Display version information
pub fn execute() {
    println!("tioverlap {}", env!("CARGO_PKG_VERSION"));
    println!("Privacy-preserving threat-indicator overlap estimation");
}
