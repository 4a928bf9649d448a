//! `SeaORM` Entity for budget_categories table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category allocation of a budget year, ordered by `position`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "budget_categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub budget_year_id: Uuid,
    pub position: i32,
    pub category_id: String,
    pub category_name: String,
    pub allocated: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budget_years::Entity",
        from = "Column::BudgetYearId",
        to = "super::budget_years::Column::Id"
    )]
    BudgetYears,
}

impl Related<super::budget_years::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BudgetYears.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
