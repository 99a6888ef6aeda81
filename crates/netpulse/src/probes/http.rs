use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, redirect};
use url::Url;

use super::{Probe, Reading};
use crate::registry::{HttpMethod, HttpParams, Params, Target};

/// GET/HEAD reachability probe for CDN edges, websites, CA OCSP/CRL
/// endpoints and IXP sites.
///
/// GET requests follow redirects the way a browser would, so a 3xx only
/// surfaces when a chain never lands. HEAD requests do not follow, which
/// lets OCSP responders that park a redirect on their root URL show up as
/// reachable-with-note instead of silently bouncing elsewhere.
pub struct HttpProbe {
    /// GET, follows redirects, verifies TLS
    follow: Client,
    /// GET, follows redirects, accepts any certificate
    follow_insecure: Client,
    /// HEAD-style client that reports 3xx as-is
    direct: Client,
}

impl HttpProbe {
    pub fn new(user_agent: &str) -> Result<Self> {
        let base = || Client::builder().user_agent(user_agent);
        Ok(Self {
            follow: base().build().context("building HTTP client failed")?,
            follow_insecure: base()
                .danger_accept_invalid_certs(true)
                .build()
                .context("building unverified HTTP client failed")?,
            direct: base()
                .redirect(redirect::Policy::none())
                .build()
                .context("building non-following HTTP client failed")?,
        })
    }

    async fn send(&self, params: &HttpParams, url: &str) -> Result<Response> {
        let request = match params.method {
            HttpMethod::Head => self.direct.head(url),
            HttpMethod::Get if !params.verify_tls => self.follow_insecure.get(url),
            HttpMethod::Get => self.follow.get(url),
        };
        request
            .timeout(params.timeout)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, target: &Target) -> Result<Reading> {
        let params = match &target.params {
            Params::Http(params) => params.clone(),
            _ => HttpParams::default(),
        };

        let response = if params.robots_fallback {
            let robots = robots_url(&target.address)?;
            let first = self.send(&params, robots.as_str()).await?;
            if first.status() == StatusCode::NOT_FOUND {
                self.send(&params, &target.address).await?
            } else {
                first
            }
        } else {
            self.send(&params, &target.address).await?
        };

        Ok(classify(response.status(), &params))
    }
}

fn classify(status: StatusCode, params: &HttpParams) -> Reading {
    if status == StatusCode::OK {
        Reading::ok()
    } else if status == StatusCode::NO_CONTENT && params.accept_no_content {
        Reading::ok_with("204 No Content")
    } else if status.is_redirection() {
        Reading::degraded(format!("redirected (status {})", status.as_u16()))
    } else {
        Reading::unreachable(format!("status {}", status.as_u16()))
    }
}

/// `https://host/path` -> `https://host/robots.txt`
fn robots_url(address: &str) -> Result<Url> {
    let mut url = Url::parse(address).with_context(|| format!("invalid URL {address:?}"))?;
    url.set_path("/robots.txt");
    url.set_query(None);
    Ok(url)
}
