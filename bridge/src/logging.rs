//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; nothing is printed until an
//! embedder (or `gmj_init_logging`) installs a subscriber.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `GMJ_LOG` nor the config provides one.
pub const DEFAULT_FILTER: &str = "godot_mujoco_bridge=info";

/// Install a stderr fmt subscriber. `GMJ_LOG` takes precedence over
/// `filter`. Returns `false` if a global subscriber was already set.
pub fn init(filter: Option<&str>) -> bool {
    let directive = std::env::var(crate::config::LOG_ENV)
        .ok()
        .or_else(|| filter.map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_FILTER.to_owned());

    let env_filter = EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("godot_mujoco_bridge: bad log filter {directive:?} ({err}), using default");
        EnvFilter::new(DEFAULT_FILTER)
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
