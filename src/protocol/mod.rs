//! Two-party overlap protocol.
//!
//! - `party`: per-party items, filter and ciphertext
//! - `orchestrator`: the run state machine
//! - `result`: the released aggregates
//! - `registry`: bookkeeping for concurrent simulation runs

pub mod orchestrator;
pub mod party;
pub mod registry;
pub mod result;

pub use orchestrator::ProtocolOrchestrator;
pub use party::{PartyMetadata, PartyState};
pub use registry::{RunId, RunRecord, RunStatus, SimulationRegistry};
pub use result::{Accuracy, OverlapSummary, PartyInfo, ProtocolResult, Verification};

use crate::bloom::BloomParams;
use crate::crypto::HeCapability;
use crate::error::Result;

pub const PARTY1_NAME: &str = "ISP-A";
pub const PARTY2_NAME: &str = "ISP-B";

/// Run the whole protocol once between `ISP-A` and `ISP-B`.
///
/// With `verify` set the cleartext audit figures are attached, which is only
/// meaningful in simulation where both item lists are local anyway.
pub fn run_simulation<H, S>(
    capability: H,
    items1: &[S],
    items2: &[S],
    params: BloomParams,
    verify: bool,
) -> Result<ProtocolResult>
where
    H: HeCapability,
    S: AsRef<str>,
{
    let mut orchestrator = ProtocolOrchestrator::new(capability);
    orchestrator.setup(
        PARTY1_NAME,
        items1,
        PARTY2_NAME,
        items2,
        params.size,
        params.hash_count,
    )?;
    orchestrator.compute()?;
    if verify {
        orchestrator.verify(items1, items2)?;
    }

    orchestrator.result().cloned().ok_or_else(|| {
        crate::error::OverlapError::NotReady("run finished without a result".to_string())
    })
}
