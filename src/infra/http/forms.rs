//! Multipart parsing for the post create/edit form.

use axum::http::StatusCode;
use axum_extra::extract::Multipart;

use crate::application::compose::ImageUpload;
use crate::application::error::HttpError;

const SOURCE: &str = "infra::http::forms";

/// Raw fields submitted by the post form. An empty group choice and an
/// empty file input both come through as absent.
#[derive(Debug, Default)]
pub(super) struct PostFormData {
    pub(super) text: String,
    pub(super) group: Option<String>,
    pub(super) image: Option<ImageUpload>,
}

pub(super) async fn read_post_form(multipart: &mut Multipart) -> Result<PostFormData, HttpError> {
    let mut form = PostFormData::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(invalid_form(err.to_string())),
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                form.text = field
                    .text()
                    .await
                    .map_err(|err| invalid_form(err.to_string()))?;
            }
            Some("group") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| invalid_form(err.to_string()))?
                    .trim()
                    .to_string();
                if !value.is_empty() {
                    form.group = Some(value);
                }
            }
            Some("image") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|value| !value.trim().is_empty());
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let Some(filename) = filename else {
                    continue;
                };

                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| invalid_form(err.to_string()))?;
                if bytes.is_empty() {
                    continue;
                }

                form.image = Some(ImageUpload {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => continue,
        }
    }

    Ok(form)
}

fn invalid_form(detail: String) -> HttpError {
    HttpError::new(SOURCE, StatusCode::BAD_REQUEST, "Invalid form data", detail)
}
