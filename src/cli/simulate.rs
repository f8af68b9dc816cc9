use super::config::AppConfig;
use super::report;
use super::DatasetArgs;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::time::Instant;
use tioverlap::crypto::SimulatedBfv;
use tioverlap::dataset;
use tioverlap::protocol::run_simulation;
use tracing::info;

/// Seeded RNG when a seed is given, OS-seeded otherwise
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Run one simulation on synthetic datasets
pub async fn execute(
    config: &AppConfig,
    args: DatasetArgs,
    output: Option<String>,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let bloom = config.bloom_params()?;
    let scheme = config.scheme_parameters(bloom.size)?;

    report::print_header("Privacy-Preserving Threat Intelligence Overlap Simulation");

    println!();
    println!("[1/4] Generating datasets...");
    println!("  Dataset 1: {} IoCs", args.dataset1_size);
    println!("  Dataset 2: {} IoCs", args.dataset2_size);
    println!("  Overlap: {}%", args.overlap_percentage);
    println!("  IoC type: {:?}", args.ioc_type);

    let mut rng = make_rng(args.seed);
    let (set1, set2, shared) = dataset::with_overlap(
        args.dataset1_size,
        args.dataset2_size,
        args.overlap_percentage,
        args.ioc_type,
        &mut rng,
    )?;
    info!(shared, "Synthetic datasets generated");

    println!();
    println!("[2/4] Setting up encryption...");
    println!("  Bloom filter size: {}", bloom.size);
    println!("  Hash functions: {}", bloom.hash_count);
    println!("  Slots: {}", scheme.slot_count);

    let start = Instant::now();

    println!();
    println!("[3/4] Executing privacy-preserving protocol...");
    let result = run_simulation(SimulatedBfv::new(scheme), &set1, &set2, bloom, verify)?;
    let elapsed = start.elapsed();

    println!();
    println!("[4/4] Results:");
    report::print_result(&result, Some(elapsed));

    if let Some(output) = output {
        report::write_json(Path::new(&output), &result, Some(elapsed))?;
        println!();
        println!("Results saved to: {}", output);
    }

    Ok(())
}
