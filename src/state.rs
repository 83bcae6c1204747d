use crate::{config::JwtConfig, db::OrmConn};

#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub jwt: JwtConfig,
}
