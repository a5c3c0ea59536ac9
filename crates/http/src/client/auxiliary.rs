//! Auxiliary reference data: categories, forms, generic names, manufacturers
//!
//! All four resources share the same list/create/update/delete surface and
//! differ only in their path and in how the writable fields are encoded.

use super::{ApiRequest, CatalogClient, ClientError, FormPart};
use medicat_core::{Category, GenericName, Manufacturer, MedicineForm, RecordId};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Writable fields of an auxiliary resource
pub trait ResourceInput {
    /// Attach the fields to `request` as its body
    fn attach(&self, request: ApiRequest) -> Result<ApiRequest, ClientError>;
}

/// A reference-data collection exposed by the backend
pub trait AuxiliaryResource: DeserializeOwned {
    /// Collection path, with leading and trailing slash
    const PATH: &'static str;
    /// Human readable name of the collection
    const LABEL: &'static str;

    type Input: ResourceInput;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormInput {
    pub form_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenericNameInput {
    pub name: String,
}

/// Image uploaded with a manufacturer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoUpload {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Manufacturer fields, sent as multipart form data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManufacturerInput {
    pub name: String,
    pub contact_info: Option<String>,
    pub website: Option<String>,
    pub logo: Option<LogoUpload>,
}

impl ResourceInput for CategoryInput {
    fn attach(&self, request: ApiRequest) -> Result<ApiRequest, ClientError> {
        request.json(self)
    }
}

impl ResourceInput for FormInput {
    fn attach(&self, request: ApiRequest) -> Result<ApiRequest, ClientError> {
        request.json(self)
    }
}

impl ResourceInput for GenericNameInput {
    fn attach(&self, request: ApiRequest) -> Result<ApiRequest, ClientError> {
        request.json(self)
    }
}

impl ResourceInput for ManufacturerInput {
    fn attach(&self, request: ApiRequest) -> Result<ApiRequest, ClientError> {
        let mut parts = vec![FormPart::Text {
            name: "name".into(),
            value: self.name.clone(),
        }];

        let optional = [("contact_info", &self.contact_info), ("website", &self.website)];
        parts.extend(optional.into_iter().filter_map(|(name, value)| {
            value.as_ref().map(|value| FormPart::Text {
                name: name.into(),
                value: value.clone(),
            })
        }));

        if let Some(logo) = &self.logo {
            parts.push(FormPart::File {
                name: "logo".into(),
                file_name: logo.file_name.clone(),
                mime: logo.mime.clone(),
                bytes: logo.bytes.clone(),
            });
        }

        Ok(request.multipart(parts))
    }
}

impl AuxiliaryResource for Category {
    const PATH: &'static str = "/categories/";
    const LABEL: &'static str = "categories";
    type Input = CategoryInput;
}

impl AuxiliaryResource for MedicineForm {
    const PATH: &'static str = "/forms/";
    const LABEL: &'static str = "forms";
    type Input = FormInput;
}

impl AuxiliaryResource for GenericName {
    const PATH: &'static str = "/generic-names/";
    const LABEL: &'static str = "generic names";
    type Input = GenericNameInput;
}

impl AuxiliaryResource for Manufacturer {
    const PATH: &'static str = "/manufacturers/";
    const LABEL: &'static str = "manufacturers";
    type Input = ManufacturerInput;
}

fn record_path<R: AuxiliaryResource>(id: RecordId) -> String {
    format!("{}{id}/", R::PATH)
}

impl CatalogClient {
    /// List every record of a reference-data collection
    pub async fn list_records<R: AuxiliaryResource>(&self) -> Result<Vec<R>, ClientError> {
        let page = self.send_list(ApiRequest::get(R::PATH)).await?;
        Ok(page.results)
    }

    pub async fn create_record<R: AuxiliaryResource>(
        &self,
        input: &R::Input,
    ) -> Result<R, ClientError> {
        self.send(input.attach(ApiRequest::post(R::PATH))?).await
    }

    pub async fn update_record<R: AuxiliaryResource>(
        &self,
        id: RecordId,
        input: &R::Input,
    ) -> Result<R, ClientError> {
        self.send(input.attach(ApiRequest::put(record_path::<R>(id)))?)
            .await
    }

    pub async fn delete_record<R: AuxiliaryResource>(&self, id: RecordId) -> Result<(), ClientError> {
        self.send_empty(ApiRequest::delete(record_path::<R>(id)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RequestBody;

    #[test]
    fn manufacturer_input_skips_unset_text_fields() {
        let input = ManufacturerInput {
            name: "Acme Pharma".into(),
            website: Some("https://acme.example".into()),
            ..ManufacturerInput::default()
        };
        let request = input.attach(ApiRequest::post(Manufacturer::PATH)).unwrap();

        let RequestBody::Multipart(parts) = request.body() else {
            panic!("expected multipart body");
        };
        let names: Vec<&str> = parts
            .iter()
            .map(|part| match part {
                FormPart::Text { name, .. } | FormPart::File { name, .. } => name.as_str(),
            })
            .collect();
        assert_eq!(names, ["name", "website"]);
    }

    #[test]
    fn json_inputs_use_field_names() {
        let request = FormInput {
            form_type: "SYR".into(),
        }
        .attach(ApiRequest::post(MedicineForm::PATH))
        .unwrap();
        let RequestBody::Json(body) = request.body() else {
            panic!("expected json body");
        };
        assert_eq!(body, &serde_json::json!({"form_type": "SYR"}));
        assert_eq!(record_path::<GenericName>(3), "/generic-names/3/");
    }
}
