pub mod decision_synth;
pub mod ledger;
pub mod orchestrator;
pub mod risk_gate;
pub mod signals;
