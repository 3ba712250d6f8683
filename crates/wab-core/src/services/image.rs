use std::sync::Arc;

use reqwest::header::ACCEPT;

use crate::{
    audit::ErrorLogger,
    domain::{ImagePayload, JPEG_CONTENT_TYPE},
    errors::Error,
    failsafe::FailSafe,
    http::HttpApiClient,
    Result,
};

/// Random image adapter (`GET {base}/randomimage[?category=…]`).
#[derive(Clone, Debug)]
pub struct RandomImageService {
    client: Arc<HttpApiClient>,
    errors: Arc<ErrorLogger>,
}

impl RandomImageService {
    pub fn new(client: Arc<HttpApiClient>, errors: Arc<ErrorLogger>) -> Self {
        Self { client, errors }
    }

    pub async fn fetch_image(&self, category: Option<&str>) -> Result<ImagePayload> {
        let query = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| vec![("category", c.to_string())])
            .unwrap_or_default();

        let resp = self
            .client
            .request("randomimage", &query, &[(ACCEPT, "image/jpg")])
            .await?;

        if !resp.is_ok() {
            return Err(Error::upstream(
                Some(resp.status),
                "randomimage: unexpected status",
            ));
        }
        if resp.body.is_empty() {
            return Err(Error::upstream(Some(resp.status), "randomimage: empty body"));
        }

        let content_type = resp
            .content_type
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or_else(|| JPEG_CONTENT_TYPE.to_string());

        Ok(ImagePayload {
            bytes: resp.body,
            content_type,
        })
    }

    /// Image bytes, or `None` so the caller can skip the photo and still reply.
    pub async fn get_random_image(&self, category: Option<&str>) -> Option<ImagePayload> {
        FailSafe::new("get_random_image")
            .input(category.unwrap_or(""))
            .logged(&self.errors)
            .run(
                async { Ok::<_, Error>(Some(self.fetch_image(category).await?)) },
                None,
            )
            .await
    }
}
