//! Checkout flow: a payment lookup runs asynchronously, and its result lands
//! in the cart state before the checkout action itself.
//!
//! RUST_LOG=middleman=debug cargo run -p middleman --example checkout

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use middleman::{
    ActionLike, AsyncContext, AsyncObserver, Middleman, MiddlemanConfig, Store, SyncContext,
    SyncObserver,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
enum CartAction {
    AddItem { sku: String, cents: u64 },
    Checkout,
    PaymentAuthorized { reference: String },
    ReceiptQueued,
}

impl ActionLike for CartAction {
    fn action_type(&self) -> &str {
        match self {
            CartAction::AddItem { .. } => "ADD_ITEM",
            CartAction::Checkout => "CHECKOUT",
            CartAction::PaymentAuthorized { .. } => "PAYMENT_AUTHORIZED",
            CartAction::ReceiptQueued => "RECEIPT_QUEUED",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Cart {
    items: Vec<String>,
    total_cents: u64,
    payment: Option<String>,
    checked_out: bool,
    receipts: usize,
}

fn reduce(cart: &mut Cart, action: &CartAction) {
    match action {
        CartAction::AddItem { sku, cents } => {
            cart.items.push(sku.clone());
            cart.total_cents += cents;
        }
        CartAction::Checkout => cart.checked_out = true,
        CartAction::PaymentAuthorized { reference } => cart.payment = Some(reference.clone()),
        CartAction::ReceiptQueued => cart.receipts += 1,
    }
}

type CartStore = Store<CartAction, Cart, fn(&mut Cart, &CartAction)>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("middleman=info".parse()?))
        .init();

    let config = MiddlemanConfig::from_env()?;
    let store: Arc<CartStore> = Arc::new(Store::new(Cart::default(), reduce as fn(&mut Cart, &CartAction)));
    store.subscribe(|cart: &Cart| info!(?cart, "Cart updated"));

    let middleman = Middleman::with_config(Arc::clone(&store), config);

    middleman.on_async(
        "CHECKOUT",
        AsyncObserver::new(|ctx: AsyncContext<CartAction, Cart>| async move {
            info!(total = ctx.current_state.total_cents, "Authorizing payment");
            tokio::time::sleep(Duration::from_millis(50)).await;
            ctx.dispatch(CartAction::PaymentAuthorized {
                reference: format!("auth-{}", ctx.current_state.total_cents),
            })
            .await?;
            Ok::<(), anyhow::Error>(())
        }),
    );
    middleman.on(
        "PAYMENT_AUTHORIZED",
        SyncObserver::new(|ctx: &SyncContext<CartAction, Cart>| {
            ctx.dispatch(CartAction::ReceiptQueued);
            Ok(())
        }),
    );

    middleman
        .dispatch(CartAction::AddItem {
            sku: "tea".to_string(),
            cents: 450,
        })
        .await?;
    middleman.dispatch(CartAction::Checkout).await?;

    let cart = store.state();
    info!(
        items = cart.items.len(),
        payment = ?cart.payment,
        checked_out = cart.checked_out,
        receipts = cart.receipts,
        "Done"
    );
    Ok(())
}
