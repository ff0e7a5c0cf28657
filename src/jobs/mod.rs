pub mod funding_reconcile;

pub use funding_reconcile::run_funding_reconcile;
