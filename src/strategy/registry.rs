//! Strategy Registry
//!
//! Named condition/action pairs kept in insertion order. Evaluation is pure:
//! the registry only turns an alert into candidate intents, guardrails and
//! execution happen downstream.

use std::fmt;
use std::sync::Arc;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::domain::{Alert, TradeIntent};

pub type Condition = Arc<dyn Fn(&Alert) -> bool + Send + Sync>;
pub type Action = Arc<dyn Fn(&Alert) -> Option<TradeIntent> + Send + Sync>;

/// Optional per-strategy bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Intents larger than this are clamped down to it
    #[serde(default)]
    pub max_amount: Option<f64>,
    /// Alerts smaller than this (SOL magnitude) never match
    #[serde(default)]
    pub min_alert_amount: Option<f64>,
    /// `[start, end)` UTC hours; wraps past midnight when start > end
    #[serde(default)]
    pub active_hours_utc: Option<(u32, u32)>,
}

impl StrategyConfig {
    fn admits(&self, alert: &Alert) -> bool {
        if let Some(min) = self.min_alert_amount {
            if alert.amount() < min {
                return false;
            }
        }
        if let Some((start, end)) = self.active_hours_utc {
            let hour = alert.timestamp().hour();
            let inside = if start <= end {
                hour >= start && hour < end
            } else {
                hour >= start || hour < end
            };
            if !inside {
                return false;
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct Strategy {
    name: String,
    condition: Condition,
    action: Action,
    config: StrategyConfig,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Strategy {
    pub fn new<C, A>(name: impl Into<String>, condition: C, action: A) -> Self
    where
        C: Fn(&Alert) -> bool + Send + Sync + 'static,
        A: Fn(&Alert) -> Option<TradeIntent> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            condition: Arc::new(condition),
            action: Arc::new(action),
            config: StrategyConfig::default(),
        }
    }

    pub fn with_config(mut self, config: StrategyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Config filters, then the condition
    pub fn matches(&self, alert: &Alert) -> bool {
        self.config.admits(alert) && (self.condition)(alert)
    }

    /// The action's intent with `max_amount` applied
    pub fn intent_for(&self, alert: &Alert) -> Option<TradeIntent> {
        let mut intent = (self.action)(alert)?;
        if let Some(max) = self.config.max_amount {
            if intent.amount > max {
                tracing::debug!(
                    "{}: clamping intent {} -> {}",
                    self.name,
                    intent.amount,
                    max
                );
                intent.amount = max;
            }
        }
        Some(intent)
    }
}

/// Result of registering a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    /// A strategy with the same name was replaced in its original slot
    Replaced { previous_index: usize },
}

/// A strategy's response to one alert
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub strategy: String,
    pub intent: TradeIntent,
}

#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Strategy>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Strategy) -> Registration {
        match self.strategies.iter().position(|s| s.name == strategy.name) {
            Some(index) => {
                tracing::info!("Strategy '{}' replaced (slot {})", strategy.name, index);
                self.strategies[index] = strategy;
                Registration::Replaced {
                    previous_index: index,
                }
            }
            None => {
                tracing::info!("Strategy '{}' registered", strategy.name);
                self.strategies.push(strategy);
                Registration::Added
            }
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Strategy> {
        let index = self.strategies.iter().position(|s| s.name == name)?;
        Some(self.strategies.remove(index))
    }

    /// Names in evaluation order
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Every strategy that matched and chose to act, in registration order
    pub fn evaluate(&self, alert: &Alert) -> Vec<Candidate> {
        self.strategies
            .iter()
            .filter(|s| s.matches(alert))
            .filter_map(|s| {
                let intent = s.intent_for(alert);
                if intent.is_none() {
                    tracing::debug!("{} matched {} but chose not to act", s.name, alert.kind());
                }
                intent.map(|intent| Candidate {
                    strategy: s.name.clone(),
                    intent,
                })
            })
            .collect()
    }
}
