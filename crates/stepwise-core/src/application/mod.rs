/// Action handlers and built-in actions
pub mod actions;

/// Flow orchestration
pub mod flow;

/// Flow Options and builder
pub mod flow_options;

/// Navigation history adapter
pub mod navigation;
