//! stockledger - Inventory balance and costing ledger.

fn main() -> std::process::ExitCode {
    stockledger::cmd::main()
}
