//! List commands implementation

use crate::backends::available_backends;

/// List all backends compiled into this binary
pub fn list_backends() {
    println!("Available backends:");
    println!();
    for backend in available_backends() {
        if backend.aliases.is_empty() {
            println!("  {:<8} - {}", backend.name, backend.description);
        } else {
            println!(
                "  {:<8} - {} (aliases: {})",
                backend.name,
                backend.description,
                backend.aliases.join(", ")
            );
        }
    }
}
