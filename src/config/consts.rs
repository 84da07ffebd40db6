/// Parent collection id recorded for a collection that is the whole port value
pub const TOP_COLLECTION: &str = "TOP";
/// Iteration selector meaning "every iteration bound to the queried port"
pub const ALL_ITERATIONS: &str = "ALL";
/// Activity classifier of a processor that runs a nested workflow
pub const DATAFLOW_ACTIVITY: &str = "dataflow";
/// Upper bound on span ancestry walks; protects against parent cycles in a broken event stream
pub const MAX_ANCESTRY_DEPTH: usize = 256;
/// Default SQLite pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
/// Default log filter when the configuration does not name one
pub const DEFAULT_LOG_FILTER: &str = "info";
/// Highest list position a boundary item may address; positions below it are synthesized as placeholders
pub const MAX_LIST_POSITION: u32 = 1 << 16;
