#[tokio::main]
async fn main() {
    if let Err(e) = cluster_ops_lib::run().await {
        // The logger may not be initialised if loading settings failed.
        eprintln!("cluster-ops: {e}");
        std::process::exit(1);
    }
}
