use rust_decimal::Decimal;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wholesale_orders::config::Config;
use wholesale_orders::domain::access::Principal;
use wholesale_orders::domain::auth::User;
use wholesale_orders::domain::catalog::{CatalogService, NewProduct};
use wholesale_orders::domain::dashboard::DashboardService;
use wholesale_orders::domain::order::{LineRequest, OrderLifecycleService, OrderStatus};
use wholesale_orders::metrics::{self, Metrics};
use wholesale_orders::notify::{LogNotifier, Notifier};
use wholesale_orders::store::{InMemoryStore, PgStore, StoreTransaction, TransactionalStore};

const DEMO_PHONE: &str = "+910000000000";

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wholesale_orders=debug"))
        )
        .init();

    let config = Config::load();

    tracing::info!("🚀 Starting wholesale order engine");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    // === 2. Pick the store and run ===
    if config.in_memory {
        tracing::info!("Using in-memory store");
        run(Arc::new(InMemoryStore::new()), &config, notifier, metrics).await
    } else {
        tracing::info!("Connecting to PostgreSQL...");
        let store = PgStore::connect(config.database_url()?, config.db_max_connections).await?;
        store.migrate().await?;
        store.ping().await?;
        tracing::info!("✅ Database ready");
        run(Arc::new(store), &config, notifier, metrics).await
    }
}

async fn run<S: TransactionalStore>(
    store: Arc<S>,
    config: &Config,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let orders = OrderLifecycleService::new(store.clone(), notifier, metrics.clone());
    let catalog = CatalogService::new(store.clone());
    let dashboard = DashboardService::new(store.clone(), config.low_stock_threshold);

    if config.demo {
        demo(store.as_ref(), &orders, &catalog, &dashboard).await?;
    }

    // === 3. Serve /metrics and /health until shutdown ===
    let registry = Arc::new(metrics.registry().clone());
    metrics::start_metrics_server(registry, config.metrics_port).await?;

    tracing::info!("👋 Shutting down");
    Ok(())
}

/// Walk one order through placement, fulfilment and a partial write-off
async fn demo<S: TransactionalStore>(
    store: &S,
    orders: &OrderLifecycleService<S>,
    catalog: &CatalogService<S>,
    dashboard: &DashboardService<S>,
) -> anyhow::Result<()> {
    tracing::info!("📝 Demonstrating order lifecycle");

    let admin = Principal::admin(uuid::Uuid::new_v4());

    let mut tx = store.begin().await?;
    let buyer = match tx.find_user_by_phone(DEMO_PHONE).await? {
        Some(existing) => existing,
        None => {
            let buyer = User::customer_from_phone(DEMO_PHONE);
            tx.insert_user(&buyer).await?;
            buyer
        }
    };
    tx.commit().await?;
    let customer = Principal::customer(buyer.id);

    // Time-ordered suffix keeps SKUs unique across runs against a persistent store
    let run_id = uuid::Uuid::now_v7().simple().to_string();
    let rice = catalog
        .create_product(&admin, demo_product(&format!("DEMO-RICE-{run_id}"), "Basmati Rice 5kg", 45000, 40))
        .await?;
    let oil = catalog
        .create_product(&admin, demo_product(&format!("DEMO-OIL-{run_id}"), "Groundnut Oil 1L", 18050, 12))
        .await?;

    let order = orders
        .create_order(&customer, vec![LineRequest::new(rice.id, 3), LineRequest::new(oil.id, 4)])
        .await?;
    tracing::info!(order_id = %order.id, total = %order.total, "✅ Demo order placed");

    orders.update_order_status(&admin, order.id, OrderStatus::Processing).await?;

    let oil_items: Vec<_> = order
        .items
        .iter()
        .filter(|item| item.product_id == oil.id)
        .map(|item| item.id)
        .collect();
    let partial = orders.cancel_order_items(&admin, order.id, &oil_items).await?;
    tracing::info!(
        status = %partial.status,
        refundable = %partial.totals.total_refundable,
        "✅ Damaged oil written off"
    );

    let shipped = orders.update_order_status(&admin, order.id, OrderStatus::Shipped).await?;
    tracing::info!(fulfilled = %shipped.totals.total_fulfilled, "✅ Demo order shipped");

    let stats = dashboard.stats(&admin).await?;
    tracing::info!(
        revenue = %stats.kpis.total_revenue,
        low_stock = stats.kpis.low_stock_count,
        "🎉 Demo complete"
    );

    Ok(())
}

fn demo_product(sku: &str, name: &str, cents: i64, stock: i32) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: name.to_string(),
        description: None,
        category: Some("Staples".to_string()),
        price: Decimal::new(cents, 2),
        stock,
        status: "active".to_string(),
    }
}
