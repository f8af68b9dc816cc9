use super::config::AppConfig;
use std::path::Path;
use tioverlap::bloom::BloomFilter;

/// Display effective configuration and derived scheme parameters
pub fn execute(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("tioverlap System Information");
    println!("============================================================");

    let config = if config_path.exists() {
        println!();
        println!("Configuration file: {}", config_path.display());
        AppConfig::load(config_path)?
    } else {
        println!();
        println!(
            "Configuration file not found: {} (using defaults; run 'init-config' to create it)",
            config_path.display()
        );
        AppConfig::default()
    };

    let bloom = config.bloom_params()?;
    let scheme = config.scheme_parameters(bloom.size)?;

    println!();
    println!("Configuration:");
    println!("  Bloom filter size: {}", bloom.size);
    println!("  Hash functions: {}", bloom.hash_count);
    println!("  Polynomial modulus degree: {}", scheme.poly_modulus_degree);
    println!("  Plaintext modulus: {}", scheme.plain_modulus);
    println!("  Log level: {}", config.logging.level);
    match &config.logging.file {
        Some(file) => println!("  Log file: {}", file.display()),
        None => println!("  Log file: (stderr)"),
    }

    println!();
    println!("Encryption backend:");
    println!("  Simulated BFV (contract only, provides no confidentiality)");
    println!("  Slots per ciphertext: {}", scheme.slot_count);

    println!();
    println!("Expected false-positive rate:");
    for items in [100usize, 1_000, 10_000] {
        let mut filter = BloomFilter::with_params(bloom);
        for i in 0..items {
            filter.insert(&i.to_string());
        }
        println!("  {:>6} IoCs: {:.6}", items, filter.false_positive_rate());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_info_without_config_file() {
        let temp_dir = TempDir::new().unwrap();
        execute(&temp_dir.path().join("missing.toml")).unwrap();
    }

    #[test]
    fn test_info_with_invalid_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[encryption]\nplain_modulus = 10\n").unwrap();
        assert!(execute(&path).is_err());
    }
}
