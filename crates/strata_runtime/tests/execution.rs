//! End-to-end execution over the in-memory store.

use serde_json::{json, Value};
use std::sync::Arc;
use strata_runtime::{
    DataStore, FnResolver, GraphQL, MemoryStore, Model, Request, Schema, SchemaBuilder,
    StrataConfig,
};

const BLOG: &str = r#"
type Query {
    users: [User!]! @all
}

type User {
    id: ID!
    name: String!
    posts: [Post!]! @hasMany
}

type Post {
    id: ID!
    title: String!
    votes: Int
}
"#;

fn store() -> Arc<MemoryStore> {
    Arc::new(
        MemoryStore::new()
            .with_table(
                "users",
                vec![json!({"id": 1, "name": "ada"}), json!({"id": 2, "name": "bob"})],
            )
            .with_table(
                "posts",
                vec![
                    json!({"id": 1, "user_id": 1, "title": "a", "votes": 3}),
                    json!({"id": 2, "user_id": 1, "title": "b", "votes": 4}),
                    json!({"id": 3, "user_id": 1, "title": "c", "votes": 5}),
                    json!({"id": 4, "user_id": 2, "title": "d", "votes": 1}),
                ],
            ),
    )
}

fn blog(sdl: &str, store: &Arc<MemoryStore>) -> SchemaBuilder {
    let store: Arc<dyn DataStore> = Arc::clone(store) as Arc<dyn DataStore>;
    Schema::builder()
        .sdl(sdl)
        .model(Model::new("User", "users").has_many("posts", "Post", "user_id"))
        .model(Model::new("Post", "posts"))
        .store(store)
}

fn graphql(builder: SchemaBuilder) -> GraphQL {
    GraphQL::new(builder.build().unwrap()).unwrap()
}

#[tokio::test]
async fn test_list_relation_is_batched() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store));

    let result = graphql
        .execute(Request::new("{ users { name posts { title } } }"))
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
        result.data.unwrap(),
        json!({
            "users": [
                {"name": "ada", "posts": [{"title": "a"}, {"title": "b"}, {"title": "c"}]},
                {"name": "bob", "posts": [{"title": "d"}]},
            ]
        })
    );
    // one select for the users, one for the posts of both
    assert_eq!(store.statement_count().await, 2);
}

#[tokio::test]
async fn test_paginated_relation() {
    let sdl = BLOG.replace("@hasMany", "@hasMany(type: PAGINATOR, defaultCount: 2)");
    let store = store();
    let graphql = graphql(blog(&sdl, &store));

    let result = graphql
        .execute(Request::new(
            "{ users { posts(page: 2) { paginatorInfo { total currentPage hasMorePages } data { title } } } }",
        ))
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
        result.data.unwrap(),
        json!({
            "users": [
                {"posts": {
                    "paginatorInfo": {"total": 3, "currentPage": 2, "hasMorePages": false},
                    "data": [{"title": "c"}],
                }},
                {"posts": {
                    "paginatorInfo": {"total": 1, "currentPage": 2, "hasMorePages": false},
                    "data": [],
                }},
            ]
        })
    );
    // users, then totals and pages for every user
    assert_eq!(store.statement_count().await, 3);
}

#[tokio::test]
async fn test_page_size_is_limited() {
    let sdl = BLOG.replace("@hasMany", "@hasMany(type: PAGINATOR, maxCount: 2)");
    let store = store();
    let graphql = graphql(blog(&sdl, &store));

    let result = graphql
        .execute(Request::new("{ users { name posts(first: 3) { data { title } } } }"))
        .await;

    assert_eq!(
        result.errors[0].message,
        "Maximum number of 2 requested items exceeded, got 3. Fetch smaller chunks."
    );
    assert_eq!(result.data.unwrap()["users"], Value::Null);
}

#[tokio::test]
async fn test_count_and_aggregate() {
    let sdl = BLOG.replace(
        "posts: [Post!]! @hasMany",
        "postCount: Int! @count(relation: \"posts\")\n    votes: Int @aggregate(relation: \"posts\", column: \"votes\", function: SUM)",
    );
    let store = store();
    let graphql = graphql(blog(&sdl, &store));

    let result = graphql
        .execute(Request::new("{ users { name postCount votes } }"))
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
        result.data.unwrap(),
        json!({
            "users": [
                {"name": "ada", "postCount": 3, "votes": 12},
                {"name": "bob", "postCount": 1, "votes": 1},
            ]
        })
    );
    assert!(store.statement_count().await <= 3);
}

#[tokio::test]
async fn test_null_propagates_to_nullable_parent() {
    let sdl = BLOG.replace("users: [User!]! @all", "users: [User!] @all");
    let store = Arc::new(
        MemoryStore::new().with_table("users", vec![json!({"id": 1, "name": "ada"}), json!({"id": 2})]),
    );
    let graphql = graphql(blog(&sdl, &store));

    let result = graphql.execute(Request::new("{ users { name } }")).await;

    assert_eq!(result.data.unwrap(), json!({"users": null}));
    assert_eq!(result.errors.len(), 1);
    let error = serde_json::to_value(&result.errors[0]).unwrap();
    assert_eq!(
        error["message"],
        json!("Cannot return null for non-nullable field User.name.")
    );
    assert_eq!(error["path"], json!(["users", 1, "name"]));
    assert_eq!(error["locations"], json!([{"line": 1, "column": 11}]));
}

#[tokio::test]
async fn test_conventional_resolver_and_arguments() {
    let graphql = graphql(
        Schema::builder()
            .sdl("type Query { greet(name: String!): String! @trim }")
            .resolver(
                "App.GraphQL.Queries.Greet",
                FnResolver::new(|_, args, _, _| {
                    let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
                    Ok(json!(format!("hello {name}")))
                }),
            ),
    );

    let result = graphql
        .execute(
            Request::new("query Greet($name: String!) { greet(name: $name) }")
                .variable("name", json!("  ada ")),
        )
        .await;

    assert_eq!(result.data.unwrap(), json!({"greet": "hello ada"}));
}

#[tokio::test]
async fn test_fragments_and_skip() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store));

    let result = graphql
        .execute(
            Request::new(
                "query Q($skip: Boolean!) { users { ...Author posts @skip(if: $skip) { title } } }
                 fragment Author on User { __typename name }",
            )
            .variable("skip", json!(true)),
        )
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
        result.data.unwrap(),
        json!({
            "users": [
                {"__typename": "User", "name": "ada"},
                {"__typename": "User", "name": "bob"},
            ]
        })
    );
}

#[tokio::test]
async fn test_request_errors() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store));

    let result = graphql.execute(Request::new("{ users { name ")).await;
    assert!(result.data.is_none());
    assert!(result.errors[0].message.starts_with("Syntax Error"));

    let result = graphql.execute(Request::new("query A { users { name } } query B { users { name } }")).await;
    assert_eq!(
        result.errors[0].message,
        "Must provide operation name if query contains multiple operations."
    );

    let result = graphql
        .execute(Request::new("query A { users { name } } query B { users { id } }").operation_name("B"))
        .await;
    assert_eq!(result.data.unwrap(), json!({"users": [{"id": "1"}, {"id": "2"}]}));

    let result = graphql.execute(Request::new("mutation { users { name } }")).await;
    assert_eq!(result.errors[0].message, "Schema is not configured for mutations.");

    let result = graphql
        .execute(Request::new("query Q($limit: Int!) { users { name } }"))
        .await;
    assert!(result.data.is_none());
    assert_eq!(
        result.errors[0].message,
        "Variable \"$limit\" of required type \"Int!\" was not provided."
    );
    assert_eq!(store.statement_count().await, 1);
}

#[tokio::test]
async fn test_batch_shares_context() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store));

    let results = graphql
        .execute_batch(vec![
            Request::new("{ users { name } }"),
            Request::new("{ users { posts { title } } }"),
        ])
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|result| result.errors.is_empty()));
    assert_eq!(results[1].data.as_ref().unwrap()["users"][1]["posts"], json!([{"title": "d"}]));
}

#[tokio::test]
async fn test_loaders_do_not_outlive_the_request() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store));
    let context = graphql.schema().context();
    let query = || Request::new("{ users { posts { title } } }");

    let first = graphql.execute_with_context(query(), context.clone()).await;
    assert!(first.errors.is_empty(), "{:?}", first.errors);
    assert!(context.loaders().is_empty());

    store
        .insert("posts", vec![json!({"id": 5, "user_id": 2, "title": "e", "votes": 0})])
        .await;
    let second = graphql.execute_with_context(query(), context.clone()).await;
    assert!(context.loaders().is_empty());
    assert_eq!(
        second.data.unwrap()["users"][1]["posts"],
        json!([{"title": "d"}, {"title": "e"}])
    );
}

#[tokio::test]
async fn test_union_members_batch_their_own_relations() {
    let sdl = r#"
        type Query { search: [SearchResult!]! }
        union SearchResult = User | Category
        type User { id: ID! posts: [Post!]! @hasMany }
        type Category { id: ID! posts: [Post!]! @hasMany }
        type Post { id: ID! title: String! }
    "#;
    let store = Arc::new(MemoryStore::new().with_table(
        "posts",
        vec![
            json!({"id": 1, "user_id": 1, "category_id": null, "title": "by-user"}),
            json!({"id": 2, "user_id": null, "category_id": 1, "title": "in-category"}),
        ],
    ));
    let graphql = graphql(
        Schema::builder()
            .sdl(sdl)
            .model(Model::new("User", "users").has_many("posts", "Post", "user_id"))
            .model(Model::new("Category", "categories").has_many("posts", "Post", "category_id"))
            .model(Model::new("Post", "posts"))
            .store(Arc::clone(&store) as Arc<dyn DataStore>)
            .resolver(
                "App.GraphQL.Queries.Search",
                FnResolver::new(|_, _, _, _| {
                    Ok(json!([{"__model": "User", "id": 1}, {"__model": "Category", "id": 1}]))
                }),
            ),
    );

    let result = graphql
        .execute(Request::new(
            "{ search { __typename ... on User { posts { title } } ... on Category { posts { title } } } }",
        ))
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(
        result.data.unwrap(),
        json!({
            "search": [
                {"__typename": "User", "posts": [{"title": "by-user"}]},
                {"__typename": "Category", "posts": [{"title": "in-category"}]},
            ]
        })
    );
    // one select per parent model
    assert_eq!(store.statement_count().await, 2);
}

#[tokio::test]
async fn test_validation_limits() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store).config(StrataConfig::new().with_max_query_depth(2)));

    let result = graphql
        .execute(Request::new("{ users { posts { title } } }"))
        .await;

    assert!(result.data.is_none());
    assert_eq!(result.errors[0].message, "Max query depth should be 2 but got 3.");
    assert_eq!(store.statement_count().await, 0);
}

#[tokio::test]
async fn test_introspection() {
    let store = store();
    let graphql = graphql(blog(BLOG, &store));

    let result = graphql
        .execute(Request::new(
            r#"{
                __schema { queryType { name } mutationType { name } }
                __type(name: "User") { kind fields { name type { kind ofType { name } } } }
            }"#,
        ))
        .await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    let data = result.data.unwrap();
    assert_eq!(data["__schema"], json!({"queryType": {"name": "Query"}, "mutationType": null}));
    assert_eq!(data["__type"]["kind"], json!("OBJECT"));
    assert_eq!(
        data["__type"]["fields"][0],
        json!({"name": "id", "type": {"kind": "NON_NULL", "ofType": {"name": "ID"}}})
    );
}
