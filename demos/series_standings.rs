use dgseries::{default_division, ClientOptions, HttpFetcher, MemoryStore, SeriesClient, SeriesConfig};

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/sows.config.json".to_string());
    let json = std::fs::read_to_string(&path).unwrap();
    let config = SeriesConfig::from_json_str(&json).unwrap();

    let fetcher = HttpFetcher::new().cache_dir(".dgseries-cache");
    let client = SeriesClient::new(config, fetcher, MemoryStore::new(), ClientOptions::default());

    let print_status = |msg: &str| println!("{msg}");
    let ctx = client.get_series_context_with_status(false, &print_status).await;
    for event in &ctx.events {
        let done = if event.is_completed { "results" } else { "upcoming" };
        println!("{:<10} {:<8} {}", event.short_label, done, event.name);
    }

    let payload = client.load_all_events_with_status(false, &print_status).await;
    println!("{} result rows", payload.rows.len());

    let divisions = client.divisions().await;
    let Some(division) = default_division(&divisions) else {
        println!("No divisions with results yet");
        return;
    };

    if let Some(description) = &client.config().standings.description {
        println!("{description}");
    }
    println!("Standings for {division}");
    for entry in client.standings(division).await {
        println!(
            "{:>4}  {:<28} {:>8}  {}",
            entry.rank_label, entry.name, entry.pdga_number, entry.total
        );
    }
}
