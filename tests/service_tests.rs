use anyhow::Result;
use kitchen::errors::KitchenError;
use kitchen::ledger::LedgerKind;
use kitchen::order_model::{OrderError, OrderLine, OrderStatus};
use kitchen::reconcile::ReconcileWarning;
use kitchen::recipe_model::{IngredientSpec, Recipe, RecipeId, Unit};
use kitchen::service::KitchenService;
use kitchen::session::StaticSession;
use kitchen::store::{KitchenStore, MemoryStore};
use rust_decimal::Decimal;

type Service = KitchenService<MemoryStore, StaticSession>;

struct Kitchen {
    service: Service,
    cookies: RecipeId,
    scones: RecipeId,
}

async fn setup() -> Result<Kitchen> {
    let service = KitchenService::new(MemoryStore::new(), StaticSession::signed_in("chef"));

    let cookies = service
        .create_recipe(
            Recipe::new(0, "Chocolate Chip Cookies", Decimal::new(1299, 2))
                .with_ingredient(IngredientSpec::new("Flour", 100.0, Unit::Grams))
                .with_ingredient(IngredientSpec::new("Chocolate Chips", 200.0, Unit::Grams)),
        )
        .await?
        .id;
    let scones = service
        .create_recipe(
            Recipe::new(0, "Scones", Decimal::new(450, 2))
                .with_ingredient(IngredientSpec::new("flour", 50.0, Unit::Grams))
                .with_ingredient(IngredientSpec::new("Milk", 100.0, Unit::Milliliters)),
        )
        .await?;

    Ok(Kitchen {
        service,
        cookies,
        scones: scones.id,
    })
}

fn quantity_of(entries: &[kitchen::ledger::LedgerEntry], name: &str) -> Option<f64> {
    entries
        .iter()
        .find(|e| e.ingredient.eq_ignore_ascii_case(name))
        .map(|e| e.quantity)
}

#[tokio::test]
async fn test_place_order_fills_shopping_list() -> Result<()> {
    let k = setup().await?;

    let change = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 2), OrderLine::new(k.scones, 3)])
        .await?;

    assert_eq!(change.order.status, OrderStatus::Ongoing);
    // 2 × 12.99 + 3 × 4.50
    assert_eq!(change.order.total_price, Decimal::new(3948, 2));
    assert!(change.warnings.is_empty());

    let shopping = k.service.shopping_list().await?;
    assert_eq!(shopping.len(), 3);
    assert_eq!(quantity_of(&shopping, "flour"), Some(350.0));
    assert_eq!(quantity_of(&shopping, "chocolate chips"), Some(400.0));
    assert_eq!(quantity_of(&shopping, "milk"), Some(300.0));
    assert!(k.service.inventory().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_second_order_merges_into_existing_entries() -> Result<()> {
    let k = setup().await?;

    k.service.place_order("Ada", vec![OrderLine::new(k.cookies, 1)]).await?;
    k.service.place_order("Bob", vec![OrderLine::new(k.scones, 2)]).await?;

    let shopping = k.service.shopping_list().await?;
    assert_eq!(shopping.len(), 3);
    assert_eq!(quantity_of(&shopping, "flour"), Some(200.0));

    Ok(())
}

#[tokio::test]
async fn test_complete_refused_when_inventory_short() -> Result<()> {
    let k = setup().await?;
    let order = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 1)])
        .await?
        .order;
    k.service.restock("Flour", 80.0, Unit::Grams).await?;
    k.service.restock("Chocolate Chips", 500.0, Unit::Grams).await?;
    let before = k.service.snapshot().await?;

    let err = k.service.complete_order(order.id).await.unwrap_err();

    let report = err.shortfall().expect("shortfall report");
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].ingredient, "Flour");
    assert_eq!(report.items[0].available, 80.0);
    assert_eq!(k.service.snapshot().await?, before);
    assert_eq!(k.service.get_order(order.id).await?.status, OrderStatus::Ongoing);

    Ok(())
}

#[tokio::test]
async fn test_complete_consumes_inventory_and_closes_order() -> Result<()> {
    let k = setup().await?;
    let order = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 1)])
        .await?
        .order;
    k.service.restock("FLOUR", 250.0, Unit::Grams).await?;
    k.service.restock("Chocolate Chips", 200.0, Unit::Grams).await?;

    let change = k.service.complete_order(order.id).await?;

    assert_eq!(change.order.status, OrderStatus::Completed);
    let inventory = k.service.inventory().await?;
    assert_eq!(quantity_of(&inventory, "flour"), Some(150.0));
    assert_eq!(quantity_of(&inventory, "chocolate chips"), None);
    assert!(k.service.shopping_list().await?.is_empty());

    assert_eq!(k.service.ongoing_orders().await?.len(), 0);
    assert_eq!(k.service.completed_orders().await?.len(), 1);

    let again = k.service.complete_order(order.id).await;
    assert!(matches!(
        again,
        Err(KitchenError::InvalidOrder(OrderError::AlreadyCompleted(_)))
    ));

    Ok(())
}

#[tokio::test]
async fn test_edit_replaces_previous_contribution() -> Result<()> {
    let k = setup().await?;
    let order = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 2)])
        .await?
        .order;

    let change = k
        .service
        .edit_order(order.id, "Ada Lovelace", vec![OrderLine::new(k.scones, 1)])
        .await?;

    assert_eq!(change.order.customer_name, "Ada Lovelace");
    assert_eq!(change.order.total_price, Decimal::new(450, 2));

    let shopping = k.service.shopping_list().await?;
    assert_eq!(quantity_of(&shopping, "flour"), Some(50.0));
    assert_eq!(quantity_of(&shopping, "chocolate chips"), None);
    assert_eq!(quantity_of(&shopping, "milk"), Some(100.0));

    let stored = k.service.get_order(order.id).await?;
    assert_eq!(stored.lines, vec![OrderLine::new(k.scones, 1)]);

    Ok(())
}

#[tokio::test]
async fn test_delete_ongoing_order_restores_shopping_list() -> Result<()> {
    let k = setup().await?;
    k.service.place_order("Bob", vec![OrderLine::new(k.scones, 1)]).await?;
    let before = k.service.shopping_list().await?;

    let order = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 1), OrderLine::new(k.scones, 2)])
        .await?
        .order;
    k.service.delete_order(order.id).await?;

    assert_eq!(k.service.shopping_list().await?, before);
    assert!(matches!(
        k.service.get_order(order.id).await,
        Err(KitchenError::OrderNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_delete_completed_order_leaves_ledgers_alone() -> Result<()> {
    let k = setup().await?;
    let order = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.scones, 1)])
        .await?
        .order;
    k.service.restock("Flour", 50.0, Unit::Grams).await?;
    k.service.restock("Milk", 300.0, Unit::Milliliters).await?;
    k.service.complete_order(order.id).await?;
    k.service.place_order("Bob", vec![OrderLine::new(k.scones, 1)]).await?;
    let before = k.service.snapshot().await?;

    let change = k.service.delete_order(order.id).await?;

    assert_eq!(change.mutations_applied, 0);
    assert_eq!(k.service.snapshot().await?, before);

    Ok(())
}

#[tokio::test]
async fn test_deleted_recipe_surfaces_warning() -> Result<()> {
    let k = setup().await?;
    let order = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 1), OrderLine::new(k.scones, 1)])
        .await?
        .order;
    k.service.delete_recipe(k.cookies).await?;

    let change = k.service.delete_order(order.id).await?;

    assert_eq!(
        change.warnings,
        vec![ReconcileWarning::MissingRecipe { recipe_id: k.cookies }]
    );
    // The cookies' share stays behind; only the scones' share is retracted
    let shopping = k.service.shopping_list().await?;
    assert_eq!(quantity_of(&shopping, "flour"), Some(100.0));
    assert_eq!(quantity_of(&shopping, "chocolate chips"), Some(200.0));
    assert_eq!(quantity_of(&shopping, "milk"), None);

    Ok(())
}

#[tokio::test]
async fn test_invalid_lines_are_rejected_before_any_write() -> Result<()> {
    let k = setup().await?;

    let result = k
        .service
        .place_order("Ada", vec![OrderLine::new(k.cookies, 0)])
        .await;

    assert!(matches!(
        result,
        Err(KitchenError::InvalidOrder(OrderError::ZeroQuantity(_)))
    ));
    assert!(k.service.ongoing_orders().await?.is_empty());
    assert!(k.service.shopping_list().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_shopping_status_and_adjust_inventory() -> Result<()> {
    let k = setup().await?;
    k.service.place_order("Ada", vec![OrderLine::new(k.scones, 4)]).await?;
    k.service.restock("flour", 150.0, Unit::Grams).await?;
    k.service.restock("Milk", 500.0, Unit::Milliliters).await?;

    let status = k.service.shopping_status().await?;
    let flour = status
        .iter()
        .find(|s| s.entry.ingredient.eq_ignore_ascii_case("flour"))
        .expect("flour status");
    assert_eq!(flour.needed_more, 50.0);
    assert!(!flour.is_sufficient);
    let milk = status
        .iter()
        .find(|s| s.entry.ingredient == "Milk")
        .expect("milk status");
    assert!(milk.is_sufficient);

    let inventory = k.service.inventory().await?;
    let flour_id = inventory
        .iter()
        .find(|e| e.ingredient == "flour")
        .map(|e| e.id)
        .expect("flour entry");
    k.service.adjust_inventory(flour_id, 300.0).await?;
    assert_eq!(quantity_of(&k.service.inventory().await?, "flour"), Some(300.0));

    k.service.adjust_inventory(flour_id, 0.0).await?;
    assert_eq!(quantity_of(&k.service.inventory().await?, "flour"), None);

    assert!(matches!(
        k.service.adjust_inventory(flour_id, 5.0).await,
        Err(KitchenError::EntryNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_users_do_not_see_each_other() -> Result<()> {
    let k = setup().await?;
    k.service.place_order("Ada", vec![OrderLine::new(k.cookies, 1)]).await?;

    k.service.session().sign_in("someone-else");

    assert!(k.service.list_recipes().await?.is_empty());
    assert!(k.service.shopping_list().await?.is_empty());
    assert!(!k
        .service
        .store()
        .list_entries("chef", LedgerKind::ShoppingList)
        .await?
        .is_empty());

    k.service.session().sign_out();
    assert!(matches!(
        k.service.shopping_list().await,
        Err(KitchenError::NotSignedIn)
    ));

    Ok(())
}
