use passport_office_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("passport office error: {err}");
        std::process::exit(1);
    }
}
