//! Repository contract against a live PostgreSQL.
//!
//! Runs when `DATABASE_URL` points at a database the tests may migrate and
//! write to; otherwise every test returns early. Each test registers its own
//! user, so runs do not interfere with each other or with earlier data.

use pantry_core::StoreError;
use pantry_core::migrate::migrate;
use pantry_core::models::{AttributeKind, NewRecipe, NewUser, RecipeChanges, User};
use pantry_core::query::{AttributeQuery, RecipeQuery};
use pantry_core::store::{
    AttributeRepository, PgStore, RecipeRepository, Store, TokenRepository, UserRepository,
};
use sqlx::postgres::PgPoolOptions;

async fn connect() -> Option<PgStore> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping PostgreSQL store test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("connect to PostgreSQL");
    migrate(&pool).await.expect("run migrations");
    Some(PgStore::new(pool))
}

async fn user(store: &PgStore) -> User {
    store
        .create_user(NewUser {
            email: format!("cook-{:016x}@example.com", rand::random::<u64>()),
            name: "Cook".into(),
            password_hash: "not-a-real-hash".into(),
        })
        .await
        .expect("create user")
}

fn recipe(title: &str, tags: &[&str], ingredients: &[&str]) -> NewRecipe {
    NewRecipe {
        title: title.into(),
        time_minutes: 10,
        price: "12.30".parse().expect("price"),
        link: String::new(),
        description: String::new(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ingredients: ingredients.iter().map(|i| i.to_string()).collect(),
    }
}

fn tag_names(recipe: &pantry_core::models::Recipe) -> Vec<&str> {
    recipe.tags.iter().map(|t| t.name.as_str()).collect()
}

#[tokio::test]
async fn ping_succeeds() {
    let Some(store) = connect().await else { return };
    store.ping().await.expect("ping");
}

#[tokio::test]
async fn price_round_trips_through_numeric() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Soup", &[], &[]))
        .await
        .expect("create");
    assert_eq!(created.price.to_string(), "12.30");
    let fetched = store.get_recipe(owner.id, created.id).await.expect("get");
    assert_eq!(fetched.price.cents(), 1230);
}

#[tokio::test]
async fn same_tag_name_is_shared_between_recipes() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let first = store
        .create_recipe(owner.id, recipe("Curry", &["Vegan"], &[]))
        .await
        .expect("create first");
    let second = store
        .create_recipe(owner.id, recipe("Salad", &["Vegan", "Vegan"], &[]))
        .await
        .expect("create second");
    assert_eq!(first.tags[0].id, second.tags[0].id);
    assert_eq!(second.tags.len(), 1);

    let tags = store
        .list_attributes(&AttributeQuery::owned_by(AttributeKind::Tag, owner.id))
        .await
        .expect("list tags");
    assert_eq!(tags.len(), 1);
}

#[tokio::test]
async fn omitted_list_keeps_links_and_empty_list_clears_them() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Curry", &["Vegan", "Spicy"], &["Rice"]))
        .await
        .expect("create");

    let renamed = store
        .update_recipe(
            owner.id,
            created.id,
            RecipeChanges {
                title: Some("Green curry".into()),
                ..RecipeChanges::default()
            },
        )
        .await
        .expect("partial update");
    assert_eq!(renamed.title, "Green curry");
    assert_eq!(renamed.price, created.price);
    assert_eq!(tag_names(&renamed), tag_names(&created));
    assert_eq!(renamed.ingredients.len(), 1);

    let cleared = store
        .update_recipe(
            owner.id,
            created.id,
            RecipeChanges {
                tags: Some(Vec::new()),
                ..RecipeChanges::default()
            },
        )
        .await
        .expect("clear tags");
    assert!(cleared.tags.is_empty());
    assert_eq!(cleared.ingredients.len(), 1);
}

#[tokio::test]
async fn foreign_recipe_is_not_found() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let other = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Curry", &[], &[]))
        .await
        .expect("create");
    assert!(matches!(
        store.get_recipe(other.id, created.id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store
            .update_recipe(other.id, created.id, RecipeChanges::default())
            .await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.delete_recipe(other.id, created.id).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn filters_match_any_id_within_a_kind() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let curry = store
        .create_recipe(owner.id, recipe("Curry", &["Vegan"], &["Rice"]))
        .await
        .expect("curry");
    let stew = store
        .create_recipe(owner.id, recipe("Stew", &["Hearty"], &["Beef"]))
        .await
        .expect("stew");
    store
        .create_recipe(owner.id, recipe("Toast", &[], &[]))
        .await
        .expect("toast");

    let both_tags = vec![curry.tags[0].id, stew.tags[0].id];
    let listed = store
        .list_recipes(&RecipeQuery::owned_by(owner.id).with_tags(both_tags.clone()))
        .await
        .expect("tag filter");
    let ids: Vec<i64> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![stew.id, curry.id]);

    let listed = store
        .list_recipes(
            &RecipeQuery::owned_by(owner.id)
                .with_tags(both_tags)
                .with_ingredients(vec![curry.ingredients[0].id]),
        )
        .await
        .expect("combined filter");
    let ids: Vec<i64> = listed.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![curry.id]);
}

#[tokio::test]
async fn assigned_only_lists_each_used_ingredient_once() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    store
        .create_recipe(owner.id, recipe("Curry", &[], &["Rice", "Garlic"]))
        .await
        .expect("curry");
    store
        .create_recipe(owner.id, recipe("Risotto", &[], &["Rice"]))
        .await
        .expect("risotto");
    let unused = store
        .create_recipe(owner.id, recipe("Bread", &[], &["Yeast"]))
        .await
        .expect("bread");
    store
        .update_recipe(
            owner.id,
            unused.id,
            RecipeChanges {
                ingredients: Some(Vec::new()),
                ..RecipeChanges::default()
            },
        )
        .await
        .expect("unlink yeast");

    let query = AttributeQuery::owned_by(AttributeKind::Ingredient, owner.id);
    let all = store.list_attributes(&query).await.expect("all");
    let names: Vec<&str> = all.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Yeast", "Rice", "Garlic"]);

    let assigned = store
        .list_attributes(&query.assigned_only(true))
        .await
        .expect("assigned");
    let names: Vec<&str> = assigned.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Rice", "Garlic"]);
}

#[tokio::test]
async fn rename_onto_existing_name_conflicts() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Curry", &["Vegan", "Spicy"], &[]))
        .await
        .expect("create");
    let spicy = created
        .tags
        .iter()
        .find(|t| t.name == "Spicy")
        .expect("spicy tag");

    let result = store
        .rename_attribute(AttributeKind::Tag, owner.id, spicy.id, "Vegan")
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Conflict { field: "name", .. })
    ));

    let renamed = store
        .rename_attribute(AttributeKind::Tag, owner.id, spicy.id, "Hot")
        .await
        .expect("rename");
    assert_eq!(renamed.name, "Hot");
}

#[tokio::test]
async fn deleting_tag_keeps_recipe() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Curry", &["Vegan"], &[]))
        .await
        .expect("create");
    store
        .delete_attribute(AttributeKind::Tag, owner.id, created.tags[0].id)
        .await
        .expect("delete tag");
    let fetched = store.get_recipe(owner.id, created.id).await.expect("get");
    assert!(fetched.tags.is_empty());
}

#[tokio::test]
async fn image_swap_returns_previous_path() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Curry", &[], &[]))
        .await
        .expect("create");

    let (first, previous) = store
        .set_recipe_image(owner.id, created.id, "uploads/recipe/a.png")
        .await
        .expect("first image");
    assert_eq!(first.image.as_deref(), Some("uploads/recipe/a.png"));
    assert_eq!(previous, None);

    let (_, previous) = store
        .set_recipe_image(owner.id, created.id, "uploads/recipe/b.png")
        .await
        .expect("second image");
    assert_eq!(previous.as_deref(), Some("uploads/recipe/a.png"));

    let removed = store
        .delete_recipe(owner.id, created.id)
        .await
        .expect("delete");
    assert_eq!(removed.as_deref(), Some("uploads/recipe/b.png"));
}

#[tokio::test]
async fn deleting_user_cascades() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let created = store
        .create_recipe(owner.id, recipe("Curry", &["Vegan"], &["Rice"]))
        .await
        .expect("create");
    store
        .replace_token(owner.id, "digest-for-cascade-test")
        .await
        .expect("token");

    store.delete_user(owner.id).await.expect("delete user");

    assert!(matches!(
        store.get_recipe(owner.id, created.id).await,
        Err(StoreError::NotFound)
    ));
    for kind in AttributeKind::ALL {
        let rows = store
            .list_attributes(&AttributeQuery::owned_by(kind, owner.id))
            .await
            .expect("list");
        assert!(rows.is_empty());
    }
    assert!(
        store
            .find_user_by_token("digest-for-cascade-test")
            .await
            .expect("token lookup")
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let Some(store) = connect().await else { return };
    let owner = user(&store).await;
    let result = store
        .create_user(NewUser {
            email: owner.email.clone(),
            name: "Other".into(),
            password_hash: "x".into(),
        })
        .await;
    assert!(matches!(
        result,
        Err(StoreError::Conflict { field: "email", .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_share_tags_in_any_order() {
    let Some(store) = connect().await else { return };
    let owner_id = user(&store).await.id;
    let names: Vec<String> = (0..30).map(|i| format!("tag-{i:02}")).collect();

    for round in 0..5 {
        let mut tasks = Vec::new();
        for writer in 0..6 {
            let store = store.clone();
            let mut tags = names.clone();
            if writer % 2 == 1 {
                tags.reverse();
            }
            tasks.push(tokio::spawn(async move {
                store
                    .create_recipe(
                        owner_id,
                        NewRecipe {
                            tags,
                            ..recipe(&format!("Batch {round}-{writer}"), &[], &[])
                        },
                    )
                    .await
            }));
        }
        for task in tasks {
            let created = task.await.expect("join").expect("create recipe");
            assert_eq!(created.tags.len(), names.len());
        }
    }

    let tags = store
        .list_attributes(&AttributeQuery::owned_by(AttributeKind::Tag, owner_id))
        .await
        .expect("list tags");
    assert_eq!(tags.len(), names.len());
}
