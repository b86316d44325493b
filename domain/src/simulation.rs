//! Synthetic sale generator.
//!
//! Inserts a random sale on a fixed interval so dashboards connected to the
//! relay see a steady trickle of live updates without any real traffic.

use crate::sales::Model;
use crate::{sale, Id, UNIT_PRICE};
use log::*;
use rand::Rng;
use sea_orm::DatabaseConnection;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const PRODUCT_IDS: RangeInclusive<Id> = 1..=3;
const QUANTITIES: RangeInclusive<i32> = 1..=5;

/// Draw a sale for a random product and quantity, priced at `UNIT_PRICE`.
pub fn random_sale<R: Rng + ?Sized>(rng: &mut R) -> Model {
    let quantity = rng.gen_range(QUANTITIES);

    Model {
        id: Default::default(),
        product_id: rng.gen_range(PRODUCT_IDS),
        quantity,
        amount: f64::from(quantity) * UNIT_PRICE,
        date: chrono::Utc::now().into(),
    }
}

/// Record a random sale every `interval` until `shutdown` fires. The first
/// sale is recorded immediately. Failures are logged and the next tick tries
/// again. A zero interval is refused and the task ends at once.
pub async fn run(
    db: Arc<DatabaseConnection>,
    channel: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    if interval.is_zero() {
        error!("Sale simulation needs a non-zero interval, not starting");
        return;
    }
    info!("Simulating a sale every {interval:?} on channel {channel}");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let new_sale = random_sale(&mut rand::thread_rng());
        match sale::record(&db, &channel, new_sale).await {
            Ok(recorded) => info!(
                "Simulated sale {}: product {} x{} = {:.2}",
                recorded.id, recorded.product_id, recorded.quantity, recorded.amount
            ),
            Err(e) => error!("Failed to record simulated sale: {e}"),
        }
    }

    info!("Sale simulation stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_sales_stay_within_the_catalogue() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let sale = random_sale(&mut rng);

            assert!(PRODUCT_IDS.contains(&sale.product_id));
            assert!(QUANTITIES.contains(&sale.quantity));
            assert!((sale.amount - f64::from(sale.quantity) * 99.99).abs() < 1e-9);
        }
    }

    #[test]
    fn every_product_and_quantity_is_drawn() {
        let mut rng = StdRng::seed_from_u64(42);
        let sales: Vec<Model> = (0..500).map(|_| random_sale(&mut rng)).collect();

        for product_id in PRODUCT_IDS {
            assert!(sales.iter().any(|s| s.product_id == product_id));
        }
        for quantity in QUANTITIES {
            assert!(sales.iter().any(|s| s.quantity == quantity));
        }
    }

    #[tokio::test]
    async fn zero_interval_ends_without_touching_the_database() {
        let shutdown = CancellationToken::new();

        run(
            Arc::new(DatabaseConnection::Disconnected),
            "sales_channel".to_string(),
            Duration::ZERO,
            shutdown.clone(),
        )
        .await;

        assert!(!shutdown.is_cancelled());
    }

    #[cfg(feature = "mock")]
    mod mock {
        use super::*;
        use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

        #[tokio::test(start_paused = true)]
        async fn records_a_sale_on_the_first_tick_and_stops_on_shutdown() {
            let recorded = Model {
                id: 1,
                product_id: 2,
                quantity: 3,
                amount: 299.97,
                date: chrono::Utc::now().into(),
            };
            let db = Arc::new(
                MockDatabase::new(DatabaseBackend::Postgres)
                    .append_query_results(vec![vec![recorded]])
                    .append_exec_results(vec![MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    }])
                    .into_connection(),
            );
            let shutdown = CancellationToken::new();

            let task = tokio::spawn(run(
                Arc::clone(&db),
                "sales_channel".to_string(),
                Duration::from_secs(30),
                shutdown.clone(),
            ));
            tokio::time::sleep(Duration::from_secs(1)).await;
            shutdown.cancel();
            task.await.unwrap();

            let db = Arc::try_unwrap(db).ok().unwrap();
            assert!(!db.into_transaction_log().is_empty());
        }

        #[tokio::test(start_paused = true)]
        async fn keeps_ticking_after_a_failed_insert() {
            // No mocked results: every insert fails.
            let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
            let shutdown = CancellationToken::new();

            let task = tokio::spawn(run(
                db,
                "sales_channel".to_string(),
                Duration::from_secs(30),
                shutdown.clone(),
            ));
            tokio::time::sleep(Duration::from_secs(95)).await;

            assert!(!task.is_finished());
            shutdown.cancel();
            task.await.unwrap();
        }
    }
}
