//! Catalog endpoint

use crate::service::converters::convert_catalog_to_proto;
use quiz::Catalog;
use quiz_proto::*;
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct CatalogEndpoints {
    catalog: Arc<Catalog>,
}

impl CatalogEndpoints {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn get_catalog(
        &self,
        _request: Request<GetCatalogRequest>,
    ) -> Result<Response<CatalogResponse>, Status> {
        tracing::debug!(levels = self.catalog.len(), "RPC get_catalog");
        Ok(Response::new(convert_catalog_to_proto(&self.catalog)))
    }
}
