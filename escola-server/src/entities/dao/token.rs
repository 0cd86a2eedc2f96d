/// A row in the `api_tokens` table. The token itself is never stored.
#[derive(Debug, Clone)]
pub struct ApiToken {
    pub id: i64,
    pub username: String,
}
