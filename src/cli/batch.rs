use super::config::AppConfig;
use super::simulate::make_rng;
use super::DatasetArgs;
use tioverlap::crypto::SimulatedBfv;
use tioverlap::dataset;
use tioverlap::protocol::{run_simulation, RunStatus, SimulationRegistry};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Run `runs` independent simulations concurrently
///
/// Every run builds its own datasets, capability and key pair on a blocking
/// worker. Progress is tracked in one registry. Seeded batches use
/// `seed + run index` per run.
pub async fn execute(
    config: &AppConfig,
    runs: usize,
    args: DatasetArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if runs == 0 {
        return Err("--runs must be at least 1".into());
    }

    let bloom = config.bloom_params()?;
    let scheme = config.scheme_parameters(bloom.size)?;
    let registry = SimulationRegistry::new();
    let mut tasks = JoinSet::new();

    for index in 0..runs {
        let id = registry.register(format!("run-{}", index + 1));
        let registry = registry.clone();
        let args = args.clone();

        tasks.spawn_blocking(move || {
            registry.mark_running(id);
            let mut rng = make_rng(args.seed.map(|s| s.wrapping_add(index as u64)));

            let datasets = dataset::with_overlap(
                args.dataset1_size,
                args.dataset2_size,
                args.overlap_percentage,
                args.ioc_type,
                &mut rng,
            );
            let outcome = match datasets {
                Ok((set1, set2, _)) => {
                    run_simulation(SimulatedBfv::new(scheme), &set1, &set2, bloom, true)
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(result) => {
                    registry.complete(id, result);
                }
                Err(e) => {
                    warn!(run = %id, error = %e, "Simulation run failed");
                    registry.fail(id, e);
                }
            }
        });
    }

    join_runs(&mut tasks, &registry).await;

    println!(
        "{:<38} {:<10} {:>10} {:>8} {:>9} {:>8}",
        "RUN", "STATUS", "ESTIMATED", "ACTUAL", "ERROR %", "JACCARD"
    );
    let mut failed = 0;
    for record in registry.list() {
        match &record.status {
            RunStatus::Completed { result } => {
                let (actual, error_pct) = result
                    .accuracy
                    .map(|a| (a.actual_overlap.to_string(), format!("{:.2}", a.error_percentage)))
                    .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
                println!(
                    "{:<38} {:<10} {:>10} {:>8} {:>9} {:>8.4}",
                    record.id,
                    "completed",
                    result.overlap_statistics.estimated_item_overlap,
                    actual,
                    error_pct,
                    result.overlap_statistics.jaccard_similarity
                );
            }
            RunStatus::Failed { error } => {
                failed += 1;
                println!("{:<38} {:<10} {}", record.id, "failed", error);
            }
            other => {
                failed += 1;
                println!("{:<38} {:?}", record.id, other);
            }
        }
    }

    info!(runs, failed, "Batch finished");
    if failed > 0 {
        return Err(format!("{} of {} runs failed", failed, runs).into());
    }
    Ok(())
}

/// Wait for every worker, then fail any run a panicked worker left unfinished.
async fn join_runs(tasks: &mut JoinSet<()>, registry: &SimulationRegistry) {
    let mut panicked = 0;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            panicked += 1;
            warn!(error = %e, "Simulation worker panicked");
        }
    }
    if panicked == 0 {
        return;
    }

    for record in registry.list() {
        if !record.status.is_finished() {
            registry.fail(record.id, "simulation worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tioverlap::dataset::DatasetKind;

    fn args() -> DatasetArgs {
        DatasetArgs {
            dataset1_size: 30,
            dataset2_size: 30,
            overlap_percentage: 50.0,
            ioc_type: DatasetKind::Hash,
            bloom_size: None,
            hash_count: None,
            seed: Some(11),
        }
    }

    #[tokio::test]
    async fn test_batch_runs_complete() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some(1024), Some(3)).unwrap();
        execute(&config, 3, args()).await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_reports_failed_runs() {
        let mut bad = args();
        bad.overlap_percentage = -5.0;
        let err = execute(&AppConfig::default(), 2, bad).await.unwrap_err();
        assert!(err.to_string().contains("2 of 2 runs failed"));
    }

    #[tokio::test]
    async fn test_batch_requires_a_run() {
        assert!(execute(&AppConfig::default(), 0, args()).await.is_err());
    }

    #[tokio::test]
    async fn test_panicked_worker_is_recorded_and_others_are_joined() {
        let registry = SimulationRegistry::new();
        let ok = registry.register("ok");
        let crashed = registry.register("crashed");
        let mut tasks = JoinSet::new();

        let r = registry.clone();
        tasks.spawn_blocking(move || {
            r.mark_running(crashed);
            panic!("worker crashed");
        });
        let r = registry.clone();
        tasks.spawn_blocking(move || {
            r.mark_running(ok);
            r.fail(ok, "dataset rejected");
        });

        join_runs(&mut tasks, &registry).await;

        assert!(tasks.is_empty());
        match registry.get(crashed).unwrap().status {
            RunStatus::Failed { error } => assert!(error.contains("panicked")),
            other => panic!("crashed run ended as {:?}", other),
        }
        match registry.get(ok).unwrap().status {
            RunStatus::Failed { error } => assert_eq!(error, "dataset rejected"),
            other => panic!("ok run ended as {:?}", other),
        }
    }
}
