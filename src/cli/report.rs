//! Human-readable and JSON rendering of protocol results

use std::fs;
use std::path::Path;
use std::time::Duration;
use tioverlap::protocol::ProtocolResult;

const RULE: &str = "============================================================";

pub fn print_header(title: &str) {
    println!("{}", RULE);
    println!("{}", title);
    println!("{}", RULE);
}

/// Print the aggregate report of one run.
pub fn print_result(result: &ProtocolResult, elapsed: Option<Duration>) {
    let stats = &result.overlap_statistics;
    println!();
    println!("Overlap Statistics:");
    println!("  Estimated item overlap: {}", stats.estimated_item_overlap);
    println!("  Jaccard similarity: {:.4}", stats.jaccard_similarity);
    println!("  Overlapping bits: {}", stats.overlap_bits);

    println!();
    println!("Party Information:");
    for party in [&result.party1_info, &result.party2_info] {
        println!(
            "  {}: {} IoCs, {} bits set",
            party.name, party.ioc_count, party.bloom_set_bits
        );
    }

    if let Some(accuracy) = &result.accuracy {
        println!();
        println!("Verification (plaintext comparison):");
        println!("  Actual overlap: {}", accuracy.actual_overlap);
        println!("  Estimated overlap: {}", accuracy.estimated_overlap);
        println!(
            "  Error: {} items ({:.2}%)",
            accuracy.error, accuracy.error_percentage
        );
    }

    println!();
    println!("Privacy:");
    println!("  Privacy preserved: {}", result.privacy_preserved());
    println!("  Raw IoCs exposed: {}", result.raw_indicators_exposed());

    if let Some(elapsed) = elapsed {
        println!();
        println!("Performance:");
        println!("  Total time: {:.2} seconds", elapsed.as_secs_f64());
    }
}

/// Serialize `result` as pretty JSON, with the run time when known.
pub fn to_json(
    result: &ProtocolResult,
    elapsed: Option<Duration>,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut value = serde_json::to_value(result)?;
    if let (Some(elapsed), Some(object)) = (elapsed, value.as_object_mut()) {
        object.insert(
            "execution_time_seconds".to_string(),
            serde_json::json!(elapsed.as_secs_f64()),
        );
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

pub fn write_json(
    path: &Path,
    result: &ProtocolResult,
    elapsed: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = to_json(result, elapsed)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create output directory: {}", e))?;
        }
    }
    fs::write(path, contents)
        .map_err(|e| format!("Failed to write results to '{}': {}", path.display(), e))?;
    Ok(())
}
