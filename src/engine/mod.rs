//! Map/shuffle/reduce execution engine
//!
//! Map tasks and reduce tasks run concurrently and never talk to each other
//! directly. Map tasks write partitioned records into the on-disk
//! [`shuffle::ShuffleStore`] and finish with a marker file; reduce tasks poll
//! for those markers, consume their partition and reduce keys in sorted order.
//!
//! ```text
//! Orchestrator ─▶ N × MapTask ─▶ <tmp>/mapper-<id>/part-<p> ─▶ R × ReduceTask ─▶ <out>/part-<p>
//! ```

pub mod errors;
pub mod map_task;
pub mod orchestrator;
pub mod partition;
pub mod record;
pub mod reduce_task;
pub mod report;
pub mod shuffle;
pub mod shutdown;

pub use errors::{TaskError, TaskResult};
pub use map_task::{MapOutcome, MapTask};
pub use orchestrator::{discover_inputs, Job, Orchestrator};
pub use partition::partition;
pub use record::{CollectingEmitter, Emitter, Record};
pub use reduce_task::{GroupedTable, PollSettings, ReduceOutcome, ReduceTask};
pub use report::{JobReport, MapperReport, ReducerReport};
pub use shuffle::{MarkerState, ShuffleStore};
pub use shutdown::TeardownGuard;
