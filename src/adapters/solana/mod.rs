pub mod executor;
pub mod rpc;
pub mod wallet;

pub use executor::WalletExecutor;
pub use rpc::SolanaClient;
pub use wallet::WalletManager;
