#[tokio::main]
async fn main() {
    contest::start_server().await;
}
