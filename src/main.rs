#[tokio::main]
async fn main() -> anyhow::Result<()> {
    atomic_jsonapi::run_server().await
}
