pub mod engine;
pub mod events;
pub mod executor;
pub mod monitor;
pub mod watcher;

pub use engine::StrategyEngine;
pub use events::EventBus;
pub use executor::{ExecutorSet, ModeSwitch, PaperExecutor, RealExecutor, TradeExecutor};
pub use monitor::{Monitor, MonitorConfig, PollError, PollReport};
pub use watcher::{TickSummary, Watcher, WatcherStatus};
