// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Poll-only mirror example.
//!
//! Logs in, mirrors every product of the account without a push stream and
//! prints session energy changes for a few minutes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example poll_only -- <username> <password> [minutes]
//! ```

use std::env;
use std::time::Duration;

use easee_sync::client::{HttpConfig, PollOnly};
use easee_sync::controller::{SyncConfig, SyncController};
use easee_sync::subscription::EntityKind;
use easee_sync::types::FieldPath;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <username> <password> [minutes]", args[0]);
        std::process::exit(1);
    }
    let minutes: u64 = args.get(3).and_then(|m| m.parse().ok()).unwrap_or(5);

    let api = HttpConfig::new(&args[1], &args[2]).into_client()?;
    let mut controller = SyncController::initialize(api, PollOnly, SyncConfig::default()).await?;

    println!("=== Easee products ===");
    let ids: Vec<_> = controller.products().iter().map(|p| p.id().clone()).collect();
    for product in controller.products() {
        println!(
            "{} ({:?}) phase={:?} online={:?}",
            product.id(),
            product.kind(),
            product.phase(),
            product.value(&FieldPath::state("isOnline")),
        );
    }
    println!();

    for id in &ids {
        if !controller.product(id).is_some_and(|p| p.kind().is_charger()) {
            continue;
        }
        controller.register_observer(
            id,
            FieldPath::state("sessionEnergy"),
            EntityKind::Sensor,
            |n| println!("{}: session energy {:?}", n.product_id(), n.value()),
        )?;
    }

    let handle = controller.start();
    println!("Mirroring for {minutes} minute(s)...");
    tokio::time::sleep(Duration::from_secs(minutes * 60)).await;

    for id in &ids {
        if let Some(snapshot) = handle.snapshot(id) {
            println!(
                "{id}: phase={:?} cost today={:.2}",
                snapshot.phase, snapshot.cost_day.cost
            );
        }
    }

    handle.shutdown().await;
    Ok(())
}
