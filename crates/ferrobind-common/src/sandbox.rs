use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::FerrobindError;

/// An HTTP client that only allows requests to approved literature APIs.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and a 30 s request timeout.
    pub fn new() -> Result<Self, FerrobindError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FerrobindError> {
        let domains = [
            "eutils.ncbi.nlm.nih.gov", // PubMed
            "api.biorxiv.org",         // bioRxiv
            "www.biorxiv.org",
            "api.elsevier.com",        // Scopus
            "api.clarivate.com",       // Web of Science
            "doi.org",
            "localhost",
            "127.0.0.1",
        ];
        let allowlist = domains.iter().map(|d| d.to_string()).collect();

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("ferrobind/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FerrobindError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else { return false };
        let Some(host) = parsed.host_str() else { return false };
        // Exact match or a subdomain of an allowed domain
        self.allowlist
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{}", allowed)))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, FerrobindError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }


    fn check(&self, url: &str) -> Result<(), FerrobindError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            tracing::warn!(url, "Blocked request outside source allowlist");
            Err(FerrobindError::Security(format!(
                "domain not in allowlist for URL {}",
                url
            )))
        }
    }
}
