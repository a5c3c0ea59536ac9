//! Medicine catalog operations

use super::{ApiRequest, CatalogClient, ClientError};
use medicat_core::{Medicine, MedicineInput, Page, SearchFilters, SearchHit};
use uuid::Uuid;

const MEDICINES_PATH: &str = "/medicines/";
const SEARCH_PATH: &str = "/medicines/search/";

fn medicine_path(id: Uuid) -> String {
    format!("{MEDICINES_PATH}{id}/")
}

impl CatalogClient {
    /// List one page of medicines, 1-based
    pub async fn list_medicines(&self, page: u32) -> Result<Page<Medicine>, ClientError> {
        self.send_list(ApiRequest::get(MEDICINES_PATH).query("page", page.max(1)))
            .await
    }

    pub async fn get_medicine(&self, id: Uuid) -> Result<Medicine, ClientError> {
        self.send(ApiRequest::get(medicine_path(id))).await
    }

    pub async fn create_medicine(&self, input: &MedicineInput) -> Result<Medicine, ClientError> {
        self.send(ApiRequest::post(MEDICINES_PATH).json(input)?)
            .await
    }

    /// Replace a medicine's writable fields
    pub async fn update_medicine(
        &self,
        id: Uuid,
        input: &MedicineInput,
    ) -> Result<Medicine, ClientError> {
        self.send(ApiRequest::put(medicine_path(id)).json(input)?)
            .await
    }

    pub async fn delete_medicine(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(medicine_path(id))).await
    }

    /// Full-text search with optional filters
    ///
    /// `filters` travels as a JSON-encoded query parameter and is left out
    /// entirely when no filter is set.
    pub async fn search_medicines(
        &self,
        query: &str,
        page: u32,
        filters: &SearchFilters,
    ) -> Result<Page<SearchHit>, ClientError> {
        let mut request = ApiRequest::get(SEARCH_PATH)
            .query("q", query)
            .query("page", page.max(1));
        if !filters.is_empty() {
            request = request.query("filters", serde_json::to_string(filters)?);
        }
        self.send_list(request).await
    }
}
