//! Card pricing CLI - resolves the market-price bundle for a single card
//! or runs a catalog search across the configured sources.

use card_pricer::{Aggregator, CardDescriptor, CardList, Config, PricingBundle, SearchQuery};
use clap::Parser;

/// Aggregates card prices from catalog, community pricing and
/// secondary-market sources.
#[derive(Parser, Debug)]
#[command(name = "card_pricer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Card name (or search text with --search)
    name: String,

    /// Collector number, e.g. "074/189" or "GG44"
    #[arg(short, long)]
    number: Option<String>,

    /// Set name, e.g. "Evolving Skies"
    #[arg(short, long)]
    set: Option<String>,

    /// Catalog language
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Run a catalog search instead of resolving one card
    #[arg(long, default_value_t = false)]
    search: bool,

    /// Rarity filter (catalog search only)
    #[arg(long)]
    rarity: Option<String>,

    /// Card type filter (catalog search only)
    #[arg(long)]
    card_type: Option<String>,

    /// Skip all pricing fetchers (catalog search only)
    #[arg(long, default_value_t = false)]
    no_pricing: bool,

    /// Bypass the result cache
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Emit JSON instead of human-readable output
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let aggregator = Aggregator::new(Config::from_env());

    if args.search {
        let query = SearchQuery {
            name: args.name.clone(),
            set_name: args.set.clone(),
            rarity: args.rarity.clone(),
            card_type: args.card_type.clone(),
            language: args.language.clone(),
            include_pricing: !args.no_pricing,
        };
        match aggregator.search_catalog(&query, args.refresh).await {
            Ok(list) => {
                if args.json {
                    print_json(&list);
                } else {
                    print_card_list(&aggregator, &list);
                }
            }
            Err(e) => {
                log::error!("Catalog search failed: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        let descriptor = CardDescriptor {
            name: args.name.clone(),
            number: args.number.clone(),
            set_name: args.set.clone(),
            language: args.language.clone(),
        };
        let bundle = aggregator.resolve_pricing(&descriptor).await;
        if args.json {
            print_json(&bundle);
        } else {
            print_bundle(&aggregator, &descriptor, &bundle);
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Failed to serialize output: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_bundle(aggregator: &Aggregator, descriptor: &CardDescriptor, bundle: &PricingBundle) {
    let mut heading = descriptor.name.clone();
    if let Some(number) = &descriptor.number {
        heading.push_str(&format!(" #{}", number));
    }
    if let Some(set) = &descriptor.set_name {
        heading.push_str(&format!(" ({})", set));
    }
    println!("Pricing for {}", heading);

    for quote in bundle.quotes.values() {
        let mut line = format!(
            "  {:<12} {:>10}",
            quote.source,
            aggregator.format_price(&quote.average_price)
        );
        if let Some(name) = &quote.matched_name {
            line.push_str(&format!("  matched: {}", name));
            if let Some(number) = &quote.matched_number {
                line.push_str(&format!(" #{}", number));
            }
        }
        if let Some(note) = &quote.note {
            line.push_str(&format!("  [{}]", note));
        }
        println!("{}", line);

        for listing in &quote.listings {
            println!(
                "      {} - {}",
                aggregator.format_price(&listing.price),
                listing.title
            );
        }
    }
}

fn print_card_list(aggregator: &Aggregator, list: &CardList) {
    if list.cards.is_empty() {
        println!("No cards found.");
        return;
    }
    for card in &list.cards {
        let mut line = card.name.clone();
        if let Some(number) = &card.number {
            line.push_str(&format!(" #{}", number));
        }
        if let Some(set) = &card.set_name {
            line.push_str(&format!(" ({})", set));
        }
        if let Some(rarity) = &card.rarity {
            line.push_str(&format!(" [{}]", rarity));
        }
        println!("{}", line);

        if let Some(bundle) = &card.pricing {
            for quote in bundle.quotes.values() {
                println!(
                    "  {:<12} {}",
                    quote.source,
                    aggregator.format_price(&quote.average_price)
                );
            }
        }
    }
    println!("========================");
    println!("{} cards found", list.cards.len());
}
