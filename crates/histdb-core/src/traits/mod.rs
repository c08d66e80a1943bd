mod audit_ledger;

pub use audit_ledger::IAuditLedger;
