use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::ports::ProductCatalog;
use crate::domain::product::ProductView;
use crate::schema::products;

use super::models::ProductRow;

pub struct DieselProductCatalog {
    pool: DbPool,
}

impl DieselProductCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ProductCatalog for DieselProductCatalog {
    fn load(&self, ids: &[Uuid]) -> Result<Vec<ProductView>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows: Vec<ProductRow> = products::table
            .filter(products::id.eq_any(ids))
            .select(ProductRow::as_select())
            .load(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|p| ProductView {
                id: p.id,
                name: p.name,
                price: p.price,
                stock_quantity: p.stock_quantity,
                is_active: p.is_active,
            })
            .collect())
    }
}
