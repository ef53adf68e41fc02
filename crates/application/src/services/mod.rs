pub mod stats_registry;

pub use stats_registry::StatsRegistry;
