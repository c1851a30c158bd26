//! Session metadata lookup tables (seeded by migration).

use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::{platforms, session_durations, session_types};

#[derive(Debug, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = platforms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Platform {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = session_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionType {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = session_durations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionDuration {
    pub id: i32,
    pub name: String,
    pub minutes: i32,
}
