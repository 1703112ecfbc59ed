fn main() {
    if let Err(err) = shipment_ledger::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
