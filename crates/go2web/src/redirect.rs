//! Redirect following on top of [`Client::fetch`]

use crate::client::Client;
use crate::error::{FetchError, Result};
use crate::response::Response;
use crate::target::Target;
use tracing::info;

impl Client {
    /// Fetch `target`, following redirects up to the configured budget
    ///
    /// Each 3xx response is discarded and its `Location` (absolute or
    /// relative to the current URL) fetched next. Returns the first
    /// non-redirect response, whose `url` is the final URL. Fails with
    /// `MaxRedirectsExceeded` when still redirecting after the budget is
    /// spent and with `MalformedRedirect` when `Location` is missing or
    /// unusable.
    pub async fn fetch_following(&self, target: &Target) -> Result<Response> {
        let mut current = target.clone();
        let mut response = self.fetch(&current).await?;
        let mut remaining = self.max_redirects();

        while response.is_redirect() {
            if remaining == 0 {
                return Err(FetchError::MaxRedirectsExceeded {
                    max: self.max_redirects(),
                });
            }

            let next = next_target(&current, &response)?;
            info!("Redirect: {} -> {}", current, next);

            remaining -= 1;
            current = next;
            response = self.fetch(&current).await?;
        }

        Ok(response)
    }
}

/// Resolve the `Location` of a redirect response against the current target
fn next_target(current: &Target, response: &Response) -> Result<Target> {
    let malformed = || FetchError::MalformedRedirect {
        status: response.status.code,
        url: current.to_string(),
    };

    let location = response
        .location()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(malformed)?;
    current.join(location).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::response::{Status, StatusClass};

    fn redirect(location: Option<&str>) -> Response {
        let mut headers = Headers::new();
        if let Some(location) = location {
            headers.insert("location", location);
        }
        Response {
            url: url::Url::parse("http://example.com/a/b").unwrap(),
            status: Status {
                code: 302,
                version: "1.1".to_string(),
                reason: "Found".to_string(),
                class: StatusClass::Redirect,
            },
            headers,
            body: String::new(),
        }
    }

    #[test]
    fn test_next_target_relative_and_absolute() {
        let current = Target::parse("http://example.com/a/b").unwrap();

        let next = next_target(&current, &redirect(Some("/login"))).unwrap();
        assert_eq!(next.url().as_str(), "http://example.com/login");

        let next = next_target(&current, &redirect(Some("https://www.example.com/"))).unwrap();
        assert_eq!(next.url().as_str(), "https://www.example.com/");
    }

    #[test]
    fn test_next_target_missing_location() {
        let current = Target::parse("http://example.com/a/b").unwrap();
        assert!(matches!(
            next_target(&current, &redirect(None)),
            Err(FetchError::MalformedRedirect { status: 302, .. })
        ));
        assert!(matches!(
            next_target(&current, &redirect(Some("  "))),
            Err(FetchError::MalformedRedirect { .. })
        ));
        assert!(matches!(
            next_target(&current, &redirect(Some("ftp://files.example.com/"))),
            Err(FetchError::MalformedRedirect { .. })
        ));
    }
}
