// src/main.rs

use reqwest::Client;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url =
        std::env::var("SHIFTWATCH_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Status page
    println!("\n🔍 Testing status endpoint...");
    let status_response = client
        .get(format!("{}/status", base_url))
        .send()
        .await?;

    println!("Status response status: {}", status_response.status());
    let status_body = status_response.text().await?;
    println!("Status body:\n{}", status_body);

    if !status_body.contains("shiftwatch") {
        println!("⚠️ Status page did not look like the shiftwatch daemon.");
    }

    // Test 2: Emitted notification log
    println!("\n🔍 Testing notifications endpoint...");
    let notifications_response = client
        .get(format!("{}/api/notifications", base_url))
        .send()
        .await?;

    println!(
        "Notifications response status: {}",
        notifications_response.status()
    );

    if notifications_response.status().is_success() {
        let notifications = notifications_response.json::<Vec<String>>().await?;
        if notifications.is_empty() {
            println!("No reminders emitted yet (shift still in progress, or no punch-in).");
        } else {
            println!("Emitted reminders ({}):", notifications.len());
            for (i, message) in notifications.iter().enumerate() {
                println!("  {}. {}", i + 1, message);
            }
        }
    } else {
        println!(
            "Failed to fetch notifications: {}",
            notifications_response.text().await?
        );
    }

    // Test 3: Poll the log a few times to watch for new reminders
    println!("\n🔍 Polling notifications for 30 seconds...");
    let mut last_seen = 0;
    for _ in 0..6 {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        let notifications = client
            .get(format!("{}/api/notifications", base_url))
            .send()
            .await?
            .json::<Vec<String>>()
            .await?;
        if notifications.len() > last_seen {
            for message in &notifications[last_seen..] {
                println!("  NEW: {}", message);
            }
            last_seen = notifications.len();
        }
    }

    println!("\n✅ Testing complete!");

    Ok(())
}
