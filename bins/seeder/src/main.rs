//! Database seeder for Armory development and testing.
//!
//! Seeds a small catalog (three sites, four item types) and a few weeks of
//! movements through the ledger repository, so balances are built the same way
//! production writes build them.
//!
//! Usage: cargo run --bin seeder

use anyhow::Context;
use armory_core::catalog::{ItemType, NewItemType, NewSite, Site};
use armory_core::ledger::{
    CreateAcquisitionInput, CreateConsumptionInput, CreateIssuanceInput, CreateTransferInput,
    Recipient, TransferStatus,
};
use armory_core::scope::{Caller, SiteVisibility};
use armory_db::{CatalogRepository, LedgerRepository};
use armory_shared::AppConfig;
use armory_shared::types::UserId;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

const SITES: [(&str, &str, &str); 3] = [
    ("NB-01", "North Base", "Ridge Line Sector 1"),
    ("HQ-01", "Headquarters", "Capital District"),
    ("FB-07", "Forward Base Seven", "Sector 7 Valley"),
];

const ITEM_TYPES: [(&str, &str, Option<&str>); 4] = [
    ("Rifle, Service", "Standard issue service rifle", None),
    ("Ammunition, 5.56mm", "Ball ammunition", Some("rounds")),
    ("Radio, Handheld", "VHF handheld radio", None),
    ("Fuel, Diesel", "Bulk diesel", Some("litres")),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    println!("Connecting to database...");
    let db = armory_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let catalog = CatalogRepository::new(db.clone());
    let ledger = LedgerRepository::with_config(db, &config.ledger);

    if !catalog.list_sites(&SiteVisibility::All).await?.is_empty() {
        println!("  Catalog already seeded, skipping...");
        return Ok(());
    }

    println!("Seeding sites...");
    let mut sites = Vec::with_capacity(SITES.len());
    for (code, name, location) in SITES {
        let site = catalog
            .create_site(&NewSite {
                code: code.to_string(),
                name: name.to_string(),
                location: location.to_string(),
            })
            .await?;
        println!("  Created site: {} ({})", site.name, site.code);
        sites.push(site);
    }

    println!("Seeding item types...");
    let mut items = Vec::with_capacity(ITEM_TYPES.len());
    for (name, description, unit) in ITEM_TYPES {
        let item = catalog
            .create_item_type(&NewItemType {
                name: name.to_string(),
                description: Some(description.to_string()),
                unit: unit.map(str::to_string),
            })
            .await?;
        println!("  Created item type: {} [{}]", item.name, item.unit);
        items.push(item);
    }

    println!("Seeding movements...");
    seed_movements(&ledger, &sites, &items).await?;

    println!("Seeding complete!");
    Ok(())
}

/// Stocks headquarters, ships part of it forward and records field usage.
async fn seed_movements(
    ledger: &LedgerRepository,
    sites: &[Site],
    items: &[ItemType],
) -> anyhow::Result<()> {
    let admin = Caller::unrestricted(UserId::new());
    let start = Utc::now() - Duration::days(21);
    let (north, hq, forward) = (&sites[0], &sites[1], &sites[2]);

    for (item, quantity) in items.iter().zip([dec!(120), dec!(50000), dec!(40), dec!(8000.50)]) {
        ledger
            .create_acquisition(
                &admin,
                &CreateAcquisitionInput {
                    destination: hq.id,
                    item_type_id: item.id,
                    quantity,
                    source_description: "Central depot".to_string(),
                    effective_at: start,
                },
            )
            .await?;
    }
    println!("  Stocked {}", hq.name);

    for (destination, days) in [(north, 3), (forward, 5)] {
        for (item, quantity) in items.iter().zip([dec!(30), dec!(12000), dec!(10), dec!(2000)]) {
            let transfer = ledger
                .create_transfer(
                    &admin,
                    &CreateTransferInput {
                        source: hq.id,
                        destination: destination.id,
                        item_type_id: item.id,
                        quantity,
                        status: None,
                        effective_at: start + Duration::days(days),
                    },
                )
                .await?;
            ledger
                .transition_transfer(&admin, transfer.id, TransferStatus::InTransit)
                .await?;
            ledger
                .transition_transfer(&admin, transfer.id, TransferStatus::Completed)
                .await?;
        }
        println!("  Shipped stock to {}", destination.name);
    }

    // Left pending so the seeded data shows a transfer still in flight.
    ledger
        .create_transfer(
            &admin,
            &CreateTransferInput {
                source: north.id,
                destination: forward.id,
                item_type_id: items[2].id,
                quantity: dec!(2),
                status: None,
                effective_at: start + Duration::days(12),
            },
        )
        .await?;

    let issued = ledger
        .create_issuance(
            &admin,
            &CreateIssuanceInput {
                site: forward.id,
                item_type_id: items[1].id,
                quantity: dec!(600),
                recipient: Recipient {
                    name: "Alpha Platoon".to_string(),
                    personnel_id: Some("PLT-A".to_string()),
                },
                effective_at: start + Duration::days(8),
            },
        )
        .await?;
    ledger
        .record_return(
            &admin,
            issued.id,
            dec!(180),
            Some(start + Duration::days(10)),
        )
        .await?;

    ledger
        .create_consumption(
            &admin,
            &CreateConsumptionInput {
                site: forward.id,
                item_type_id: items[3].id,
                quantity: dec!(450.25),
                reason: "Generator operation".to_string(),
                effective_at: start + Duration::days(9),
            },
        )
        .await?;
    println!("  Recorded field usage at {}", forward.name);

    Ok(())
}
