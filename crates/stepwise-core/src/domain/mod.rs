/// Flow and step events
pub mod events;

/// Key-press hub
pub mod keyboard;

/// Listener registry shared by flows, steps and the key hub
pub mod notifier;

/// Step entity and lifecycle
pub mod step;

/// Step options and transforms
pub mod step_options;

/// Step persistence strategies
pub mod store;
