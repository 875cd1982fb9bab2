pub mod config;
pub mod governor;
pub mod lookup;
pub mod metrics;
pub mod pipeline;
pub mod table;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use governor::{Governor, GovernorError, Permit};
pub use lookup::{
    ErrorKind, HttpLookupClient, IdentifierPreference, LookupClient, LookupConfig, LookupError,
    LookupOutcome, LookupQuery, LookupServiceKind,
};
pub use pipeline::{
    execute, CancellationSignal, EnrichedRow, Pipeline, PipelineConfig, PipelineError, Row,
    RunStats,
};
pub use table::{CsvSink, CsvSource, MemorySink, MemorySource, RowSink, RowSource, TableError};
