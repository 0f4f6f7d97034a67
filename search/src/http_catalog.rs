//! HTTP client for the github-macros cloud functions.

use ghmacros_protocol::AddMacroResponse;
use ghmacros_protocol::CLIENT_VERSION;
use ghmacros_protocol::MacroItem;
use ghmacros_protocol::QueryKind;
use ghmacros_protocol::QueryResponse;
use ghmacros_protocol::UsageTrigger;
use serde::de::DeserializeOwned;
use url::Url;

use crate::catalog::CatalogError;
use crate::catalog::MacroCatalog;
use crate::catalog::SearchPage;

pub const DEFAULT_ENDPOINT: &str = "https://us-central1-github-macros.cloudfunctions.net";

#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    /// Always ends with `/` so relative joins append instead of replacing.
    base: Url,
}

impl HttpCatalog {
    pub fn new(endpoint: &str) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("ghmacros/{CLIENT_VERSION}"))
            .build()
            .map_err(|source| CatalogError::Request {
                url: endpoint.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base: normalize_base(endpoint)?,
        })
    }

    pub fn listing_url(&self, text: &str, page: u32) -> Result<Url, CatalogError> {
        let kind = QueryKind::for_listing(text);
        let mut url = self.base.join("query/")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("type", kind.as_str());
            if kind == QueryKind::Search {
                pairs.append_pair("text", text);
            }
            pairs.append_pair("page", &page.to_string());
        }
        Ok(url)
    }

    pub fn get_url(&self, name: &str) -> Result<Url, CatalogError> {
        let mut url = self.base.join("query/")?;
        url.query_pairs_mut()
            .append_pair("type", QueryKind::Get.as_str())
            .append_pair("text", name)
            .append_pair("version", CLIENT_VERSION);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let body = self.send(self.client.get(url.clone()), &url).await?;
        decode(&url, &body)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<String, CatalogError> {
        let url = self.base.join(path)?;
        self.send(self.client.post(url.clone()).form(form), &url)
            .await
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<String, CatalogError> {
        let response = request
            .send()
            .await
            .map_err(|source| CatalogError::Request {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|source| CatalogError::Request {
            url: url.to_string(),
            source,
        })
    }
}

impl MacroCatalog for HttpCatalog {
    async fn search(&self, text: &str, page: u32) -> Result<SearchPage, CatalogError> {
        let url = self.listing_url(text, page)?;
        let response: QueryResponse = self.get_json(url.clone()).await?;
        into_search_page(&url, response)
    }

    async fn get(&self, name: &str) -> Result<Vec<MacroItem>, CatalogError> {
        let url = self.get_url(name)?;
        let response: QueryResponse = self.get_json(url).await?;
        Ok(response.data)
    }

    async fn add(
        &self,
        name: &str,
        url: &str,
        github_url: Option<&str>,
    ) -> Result<AddMacroResponse, CatalogError> {
        let endpoint = self.base.join("add/")?;
        let body = self
            .post_form(
                "add/",
                &[
                    ("name", name),
                    ("url", url),
                    ("github_url", github_url.unwrap_or_default()),
                    ("version", CLIENT_VERSION),
                ],
            )
            .await?;
        decode(&endpoint, &body)
    }

    async fn report_usage(&self, name: &str, trigger: UsageTrigger) -> Result<(), CatalogError> {
        self.post_form(
            "usage/",
            &[
                ("name", name),
                ("trigger", trigger.as_str()),
                ("version", CLIENT_VERSION),
            ],
        )
        .await?;
        Ok(())
    }

    async fn report_broken(&self, name: &str) -> Result<(), CatalogError> {
        self.post_form("report/", &[("name", name), ("version", CLIENT_VERSION)])
            .await?;
        Ok(())
    }
}

fn normalize_base(endpoint: &str) -> Result<Url, CatalogError> {
    let trimmed = endpoint.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

fn decode<T: DeserializeOwned>(url: &Url, body: &str) -> Result<T, CatalogError> {
    serde_json::from_str(body).map_err(|err| CatalogError::MalformedResponse {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

/// Paginated responses must say whether more pages exist.
fn into_search_page(url: &Url, response: QueryResponse) -> Result<SearchPage, CatalogError> {
    let Some(has_more) = response.has_more else {
        return Err(CatalogError::MalformedResponse {
            url: url.to_string(),
            reason: "missing `has_more`".to_string(),
        });
    };
    Ok(SearchPage {
        items: response.data,
        has_more,
        system_message: response.system_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog(endpoint: &str) -> HttpCatalog {
        HttpCatalog::new(endpoint).expect("build catalog")
    }

    #[test]
    fn search_and_suggestion_urls() {
        let catalog = catalog("https://macros.example/api");
        assert_eq!(
            catalog.listing_url("party cat", 2).expect("url").as_str(),
            "https://macros.example/api/query/?type=search&text=party+cat&page=2"
        );
        assert_eq!(
            catalog.listing_url("", 0).expect("url").as_str(),
            "https://macros.example/api/query/?type=suggestion&page=0"
        );
    }

    #[test]
    fn get_url_carries_version() {
        let catalog = catalog("https://macros.example/");
        assert_eq!(
            catalog.get_url("party").expect("url").as_str(),
            format!("https://macros.example/query/?type=get&text=party&version={CLIENT_VERSION}")
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(matches!(
            HttpCatalog::new("not a url"),
            Err(CatalogError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn listing_without_has_more_is_malformed() {
        let url = Url::parse("https://macros.example/query/").expect("url");
        let response = QueryResponse {
            data: vec![MacroItem::new("a", "u")],
            has_more: None,
            system_message: None,
        };
        assert!(matches!(
            into_search_page(&url, response),
            Err(CatalogError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn undecodable_body_is_malformed() {
        let url = Url::parse("https://macros.example/query/").expect("url");
        let result: Result<QueryResponse, _> = decode(&url, "<html>oops</html>");
        assert!(matches!(
            result,
            Err(CatalogError::MalformedResponse { .. })
        ));
    }
}
