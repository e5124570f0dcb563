//! Built-in strategies
//!
//! - `copy_buy`: mirror a tracked account acquiring a token, with a fixed SOL size
//! - `whale_inflow`: buy a fixed asset when a tracked account receives a large SOL inflow

use crate::domain::{AlertKind, AssetTransfer, TradeIntent, NATIVE_MINT};

use super::registry::Strategy;

/// Token acquisitions in an asset-transfer alert, excluding wrapped SOL
fn acquisitions(transfers: &[AssetTransfer]) -> impl Iterator<Item = &AssetTransfer> {
    transfers
        .iter()
        .filter(|t| t.amount > 0.0 && t.asset_id != NATIVE_MINT)
}

/// Buy `sol_amount` of whatever token a tracked account just acquired
///
/// An empty `accounts` list follows every tracked account.
pub fn copy_buy(name: impl Into<String>, sol_amount: f64, accounts: Vec<String>) -> Strategy {
    Strategy::new(
        name,
        move |alert| {
            alert.kind() == AlertKind::AssetTransfer
                && (accounts.is_empty() || accounts.iter().any(|a| *a == alert.account().address))
                && acquisitions(alert.asset_transfers()).next().is_some()
        },
        move |alert| {
            let transfer = acquisitions(alert.asset_transfers()).next()?;
            let mut intent = TradeIntent::buy(transfer.asset_id.clone(), sol_amount);
            intent.symbol = transfer.symbol.clone();
            Some(intent)
        },
    )
}

/// Buy `sol_amount` of `asset_id` on a large inbound transfer
pub fn whale_inflow(
    name: impl Into<String>,
    asset_id: impl Into<String>,
    symbol: Option<String>,
    sol_amount: f64,
) -> Strategy {
    let asset_id = asset_id.into();
    Strategy::new(
        name,
        |alert| alert.kind() == AlertKind::LargeTransfer && alert.is_inbound(),
        move |_| {
            let mut intent = TradeIntent::buy(asset_id.clone(), sol_amount);
            intent.symbol = symbol.clone();
            Some(intent)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alert, TrackedAccount, TransactionDetail};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn alert(kind: AlertKind, owner: &str, delta: f64, transfers: Vec<AssetTransfer>) -> Alert {
        let mut deltas = BTreeMap::new();
        deltas.insert(owner.to_string(), delta);
        let detail = TransactionDetail {
            signature: "sig".to_string(),
            slot: 1,
            block_time: None,
            success: true,
            fee: 0.0,
            balance_deltas: deltas,
            asset_transfers: transfers.clone(),
        };
        Alert::new(kind, TrackedAccount::new(owner, "W"), detail, transfers, Utc::now())
    }

    fn transfer(asset_id: &str, amount: f64) -> AssetTransfer {
        AssetTransfer {
            asset_id: asset_id.to_string(),
            symbol: Some("TOK".to_string()),
            owner: "whale".to_string(),
            amount,
        }
    }

    #[test]
    fn test_copy_buy_mirrors_acquisition() {
        let strategy = copy_buy("copy", 0.05, Vec::new());
        let a = alert(
            AlertKind::AssetTransfer,
            "whale",
            -1.0,
            vec![transfer(NATIVE_MINT, 1.0), transfer("mintTOK", 5000.0)],
        );

        assert!(strategy.matches(&a));
        let intent = strategy.intent_for(&a).unwrap();
        assert_eq!(intent.asset_id, "mintTOK");
        assert_eq!(intent.amount, 0.05);
        assert_eq!(intent.symbol.as_deref(), Some("TOK"));
    }

    #[test]
    fn test_copy_buy_ignores_sales_and_other_accounts() {
        let strategy = copy_buy("copy", 0.05, vec!["whale".to_string()]);
        let sold = alert(AlertKind::AssetTransfer, "whale", 1.0, vec![transfer("mintTOK", -10.0)]);
        assert!(!strategy.matches(&sold));

        let other = alert(AlertKind::AssetTransfer, "shrimp", -1.0, vec![transfer("mintTOK", 10.0)]);
        assert!(!strategy.matches(&other));
    }

    #[test]
    fn test_whale_inflow() {
        let strategy = whale_inflow("inflow", "mintJUP", Some("JUP".to_string()), 0.2);
        assert!(strategy.matches(&alert(AlertKind::LargeTransfer, "whale", 50.0, Vec::new())));
        assert!(!strategy.matches(&alert(AlertKind::LargeTransfer, "whale", -50.0, Vec::new())));
        assert!(!strategy.matches(&alert(AlertKind::Inbound, "whale", 50.0, Vec::new())));

        let intent = strategy
            .intent_for(&alert(AlertKind::LargeTransfer, "whale", 50.0, Vec::new()))
            .unwrap();
        assert_eq!(intent.asset_id, "mintJUP");
    }
}
