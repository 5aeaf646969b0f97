//! Interface tests for routing and rescue behavior using Cucumber.
//!
//! ```bash
//! cargo test --test interfaces
//! ```

mod steps;

use cucumber::World;
use steps::rescue::RescueWorld;
use steps::routing::RoutingWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running Routing Interface Tests ===\n");
    RoutingWorld::cucumber()
        .fail_on_skipped()
        .run("tests/interfaces/features/routing.feature")
        .await;

    println!("\n=== Running Rescue Interface Tests ===\n");
    RescueWorld::cucumber()
        .fail_on_skipped()
        .run("tests/interfaces/features/rescue.feature")
        .await;
}
