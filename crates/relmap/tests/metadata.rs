mod fixtures;

use fixtures::*;
use relmap::prelude::*;
use relmap::{MetadataErrorKind, RelationKind};

fn content_registry() -> MetadataRegistry {
    let mut builder = MetadataBuilder::new();
    builder
        .register(
            TableDecl::abstract_base("Content"),
            vec![
                ColumnDecl::primary("id"),
                ColumnDecl::new("title", SqlType::VarChar(80)),
                ColumnDecl::new("createdAt", SqlType::Timestamp).create_date(true),
            ],
            vec![RelationDecl::many_to_one("owner", "User")],
        )
        .unwrap()
        .register(
            TableDecl::new("Article").extends("Content"),
            vec![
                ColumnDecl::new("title", SqlType::Text).nullable(true),
                ColumnDecl::new("body", SqlType::Text),
            ],
            vec![],
        )
        .unwrap()
        .register(TableDecl::new("User"), vec![ColumnDecl::primary("id")], vec![])
        .unwrap();
    builder.build(&["Article"]).unwrap()
}

#[test]
fn own_declarations_win_over_inherited_ones() {
    let registry = content_registry();
    let article = registry.find("Article").unwrap();

    let props: Vec<&str> = article.columns.iter().map(|c| c.property.as_str()).collect();
    assert_eq!(props, vec!["id", "title", "createdAt", "body"]);
    let title = article.column("title").unwrap();
    assert_eq!(title.sql_type, SqlType::Text);
    assert!(title.is_nullable);

    let owner = article.relation("owner").unwrap();
    assert_eq!(owner.kind, RelationKind::ManyToOne);
    assert_eq!(owner.entity, "Article");
    // Targets are built transitively.
    assert!(registry.contains("User"));
    assert!(!registry.contains("Content"));
}

#[test]
fn inherited_columns_hydrate_like_own_ones() {
    let mut manager = EntityManager::new(content_registry())
        .with_config(EngineConfig::new().column_separator("__"));
    let aliases = manager.aliases("a", "Article", &["owner"]).unwrap();
    let rows = vec![row(vec![
        ("a__id", Value::BigInt(3)),
        ("a__title", Value::from("Hello")),
        ("a__created_at", Value::Timestamp(10)),
        ("a__body", Value::from("...")),
        ("a__owner_id", Value::BigInt(9)),
        ("a_owner__id", Value::BigInt(9)),
    ])];
    let articles = manager.hydrate(&rows, &aliases).unwrap();

    assert_eq!(articles[0].get("created_at"), None);
    assert_eq!(articles[0].get("createdAt"), Some(&Value::Timestamp(10)));
    let owner = articles[0].relation("owner").and_then(Related::as_one).unwrap();
    assert_eq!(owner.get("id"), Some(&Value::BigInt(9)));
}

#[test]
fn registry_lookups_by_entity_and_table_name() {
    let registry = blog_registry();
    assert_eq!(registry.find("Post").unwrap().table.name, "post");
    assert_eq!(registry.find("post").unwrap().name, "Post");

    let err = registry.find("Ghost").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn declaring_a_property_twice_is_rejected() {
    let mut builder = MetadataBuilder::new();
    let err = builder
        .register(
            TableDecl::new("Post"),
            vec![ColumnDecl::primary("id"), ColumnDecl::new("author", SqlType::Text)],
            vec![RelationDecl::many_to_one("author", "User")],
        )
        .unwrap_err();

    assert!(err.is_duplicate_metadata());
    match err {
        Error::Metadata(e) => assert_eq!(e.kind, MetadataErrorKind::Duplicate),
        other => panic!("expected metadata error, got {other:?}"),
    }
}

#[test]
fn config_is_read_from_json() {
    let config = EngineConfig::from_json(r#"{ "column_separator": "__" }"#).unwrap();
    assert_eq!(config.column_separator, "__");
    assert!(config.diff_relation_keys);
    assert!(config.skip_date_columns_in_diff);

    let manager = EntityManager::new(blog_registry()).with_config(config.clone());
    assert_eq!(manager.config(), &config);

    let err = EngineConfig::from_json(r#"{ "column_separator": "" }"#).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
