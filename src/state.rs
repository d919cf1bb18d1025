use std::sync::Arc;

use crate::{
    config::JwtConfig,
    db::{DbPool, OrmConn, create_orm_conn},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub jwt: Arc<JwtConfig>,
}

impl AppState {
    pub fn new(pool: DbPool, jwt: JwtConfig) -> Self {
        let orm = create_orm_conn(&pool);
        Self {
            pool,
            orm,
            jwt: Arc::new(jwt),
        }
    }
}
