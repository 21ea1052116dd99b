use async_graphql::{EmptyMutation, EmptySubscription, Object, Schema, SimpleObject, ID};
use lazy_static::lazy_static;

lazy_static! {
    static ref USERS: Vec<User> = vec![
        User {
            id: ID("1".to_string()),
            name: Name {
                first: "Ada".to_string(),
                last: "Lovelace".to_string(),
            },
            username: "@ada".to_string(),
        },
        User {
            id: ID("2".to_string()),
            name: Name {
                first: "Alan".to_string(),
                last: "Turing".to_string(),
            },
            username: "@complete".to_string(),
        },
    ];
}

#[derive(SimpleObject, Clone)]
pub struct Name {
    first: String,
    last: String,
}

#[derive(SimpleObject, Clone)]
pub struct User {
    id: ID,
    name: Name,
    username: String,
}

pub struct Query;

#[Object]
impl Query {
    async fn me(&self) -> Option<User> {
        USERS.first().cloned()
    }

    #[graphql(entity)]
    async fn find_user_by_id(&self, id: ID) -> Result<User, async_graphql::Error> {
        USERS
            .iter()
            .find(|user| user.id == id)
            .cloned()
            .ok_or_else(|| async_graphql::Error::new(format!("User {} not found", id.as_str())))
    }
}

pub fn get_subgraph() -> Schema<Query, EmptyMutation, EmptySubscription> {
    Schema::build(Query, EmptyMutation, EmptySubscription)
        .enable_federation()
        .finish()
}
