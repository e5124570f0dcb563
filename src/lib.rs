//! Whale Watcher - Solana account watcher and alert-driven trader
//!
//! Polls tracked accounts, classifies new transactions into alerts and lets
//! strategies react with trades against a paper ledger or the operator wallet.
//!
//! # Modules
//!
//! - `domain`: Core logic (ChangeDetector, AlertClassifier, Ledger, Guardrails, persistence)
//! - `ports`: Trait abstractions (AccountDataSource, AccountExecutor, PriceLookup)
//! - `strategy`: Strategy registry and built-in strategies
//! - `application`: Monitor, StrategyEngine, executors and the watcher loop
//! - `adapters`: External implementations (Solana RPC, Jupiter, CLI)
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod strategy;
