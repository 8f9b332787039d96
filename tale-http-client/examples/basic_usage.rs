//! Basic usage example for the Tale HTTP client
//!
//! This example demonstrates how to:
//! - Create a client from `TALE_*` environment variables
//! - Log in with email and password
//! - Read hero state and the card hand
//! - Check market prices for a card
//!
//! Note: This example needs real credentials in `TALE_EMAIL` and `TALE_PASSWORD`.

use tale_http_client::{HeroAction, TaleClientBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let email = std::env::var("TALE_EMAIL").expect("TALE_EMAIL environment variable not set");
    let password = std::env::var("TALE_PASSWORD").expect("TALE_PASSWORD environment variable not set");

    println!("=== Connecting ===");
    let client = TaleClientBuilder::from_env()?.build()?;
    println!("✓ Client created for {}", client.base_url());

    let game = client.game_info()?;
    println!("✓ Game info: {:?}", game.data());

    println!("\n=== Logging in ===");
    let account = client.login(&email, &password)?;
    println!(
        "✓ Logged in as {} (#{:?})",
        account.session().account_name().unwrap_or("<unknown>"),
        account.session().account_id()
    );

    println!("\n=== Hero ===");
    let hero = account.hero_info(&[], None)?;
    match hero.as_json().and_then(HeroAction::from_hero_info) {
        Some(action) => println!("✓ Hero is busy with {:?}", action),
        None => println!("✗ Could not read hero action"),
    }

    println!("\n=== Cards ===");
    account.receive_cards()?;
    let cards = account.cards()?;
    println!("✓ Hand: {:?}", cards.data());

    if let Some(item_type) = std::env::args().nth(1) {
        let prices = account.shop_item_prices(&item_type)?;
        println!("✓ Prices for {}: {:?}", item_type, prices.data());
    }

    account.logout()?;
    println!("\n✓ Logged out");
    Ok(())
}
