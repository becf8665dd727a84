/// Display version information
pub fn execute() {
    println!("lotus {}", env!("CARGO_PKG_VERSION"));
    println!("Always-on chat client");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        execute();
    }
}
