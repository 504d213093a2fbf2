#[tokio::main]
async fn main() -> anyhow::Result<()> {
    amulet_app::run_app().await
}
