use super::config::AppConfig;
use super::report;
use std::path::Path;
use std::time::Instant;
use tioverlap::crypto::SimulatedBfv;
use tioverlap::dataset;
use tioverlap::indicator::IndicatorKind;
use tioverlap::protocol::run_simulation;

/// Compare two indicator files
///
/// Both files are local, so the cleartext accuracy figures are always attached.
pub async fn execute(
    config: &AppConfig,
    file1: String,
    file2: String,
    ioc_type: Option<IndicatorKind>,
    output: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let bloom = config.bloom_params()?;
    let scheme = config.scheme_parameters(bloom.size)?;

    println!("Loading IoC files...");
    let set1: Vec<String> = dataset::load_from_file(Path::new(&file1), ioc_type)?
        .into_iter()
        .map(|i| i.into_value())
        .collect();
    let set2: Vec<String> = dataset::load_from_file(Path::new(&file2), ioc_type)?
        .into_iter()
        .map(|i| i.into_value())
        .collect();
    println!("  File 1: {} IoCs", set1.len());
    println!("  File 2: {} IoCs", set2.len());

    println!();
    println!("Executing protocol...");
    let start = Instant::now();
    let result = run_simulation(SimulatedBfv::new(scheme), &set1, &set2, bloom, true)?;
    let elapsed = start.elapsed();

    report::print_result(&result, Some(elapsed));

    if let Some(output) = output {
        report::write_json(Path::new(&output), &result, None)?;
        println!();
        println!("Results saved to: {}", output);
    }

    Ok(())
}
